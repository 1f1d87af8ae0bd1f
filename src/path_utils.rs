//! Path utilities for safe and robust file path handling.
//!
//! This module resolves where a conversion writes its container, derives
//! fallback titles from manuscript file names, and guards against paths that
//! Windows or zip readers cannot handle (overlong paths, reserved characters).

use crate::error::{Error, Result};
use crate::types::FileFormat;

use std::path::{Path, PathBuf};

/// Maximum path length for Windows without long path support
const WINDOWS_MAX_PATH: usize = 260;

/// Windows long path prefix
const WINDOWS_LONG_PATH_PREFIX: &str = r"\\?\";

/// Suffix of the file a generator writes to before it is renamed into place.
const PARTIAL_SUFFIX: &str = "part";

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Safely converts a path to a string, failing on non UTF-8 paths.
fn path_to_string_safe(path: &Path) -> Result<String> {
    path.to_str().map(|s| s.to_string()).ok_or_else(|| {
        Error::InvalidPath(path.to_path_buf(), "Path is not valid UTF-8".to_string())
    })
}

/// Derives a book title from a manuscript file name (`novel.txt` -> `novel`).
pub fn title_from_source(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().trim().to_string())
        .filter(|stem| !stem.is_empty())
}

/// Checks if a path is potentially problematic due to length or special characters.
pub fn validate_path(path: &Path) -> Result<()> {
    let path_str = path_to_string_lossy(path);

    if cfg!(windows)
        && path_str.len() > WINDOWS_MAX_PATH
        && !path_str.starts_with(WINDOWS_LONG_PATH_PREFIX)
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            format!("Path exceeds {} characters", WINDOWS_MAX_PATH),
        ));
    }

    // The long path prefix itself contains a question mark
    let path_to_check = path_str
        .strip_prefix(WINDOWS_LONG_PATH_PREFIX)
        .unwrap_or(&path_str);

    if path_to_check
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Prepares a path for Windows long path support if needed.
pub fn prepare_long_path(path: &Path) -> Result<PathBuf> {
    let path_str = path_to_string_safe(path)?;

    if cfg!(windows)
        && path_str.len() > WINDOWS_MAX_PATH
        && !path_str.starts_with(WINDOWS_LONG_PATH_PREFIX)
    {
        let absolute_path = path.canonicalize().map_err(|e| {
            Error::InvalidPath(
                path.to_path_buf(),
                format!("Cannot canonicalize path: {}", e),
            )
        })?;

        let absolute_str = path_to_string_safe(&absolute_path)?;
        Ok(PathBuf::from(format!(
            "{}{}",
            WINDOWS_LONG_PATH_PREFIX, absolute_str
        )))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Sanitizes a file name by replacing invalid characters with safe alternatives.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Normalizes a path for consistent handling across platforms.
///
/// Existing paths are canonicalized; paths that do not exist yet (output
/// files) are validated and returned unchanged.
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    validate_path(path)?;

    match path.canonicalize() {
        Ok(canonical) => prepare_long_path(&canonical),
        Err(e) => {
            if path.exists() {
                Err(Error::InvalidPath(
                    path.to_path_buf(),
                    format!("Cannot access path: {}", e),
                ))
            } else {
                Ok(path.to_path_buf())
            }
        }
    }
}

/// Final location of a container: `<dir>/<base>.<ext>`.
///
/// A `base` that already ends with the format's extension is not suffixed
/// again.
pub fn output_file_path(output_dir: &Path, base_filename: &str, format: FileFormat) -> PathBuf {
    let extension = format.extension();
    let suffix = format!(".{}", extension);
    if base_filename
        .to_ascii_lowercase()
        .ends_with(&suffix)
    {
        output_dir.join(base_filename)
    } else {
        output_dir.join(format!("{}{}", base_filename, suffix))
    }
}

/// Location a generator writes to before the container is complete.
pub fn partial_file_path(output_file: &Path) -> PathBuf {
    let mut partial = output_file.as_os_str().to_owned();
    partial.push(".");
    partial.push(PARTIAL_SUFFIX);
    PathBuf::from(partial)
}
