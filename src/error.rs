//! Custom error types and result handling for Kansho operations.
//!
//! This module defines the error handling system used throughout Kansho.
//! All fallible operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!
//! The segmentation core itself never fails: every error originates at its
//! boundary (decoding, pattern compilation, or writing the container) and is
//! terminal for the conversion run.
use std::path::PathBuf;

/// Type alias for Results with Kansho errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Kansho operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Chapter or sub-chapter pattern failed to compile
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// EPUB generation errors
    #[error(transparent)]
    Epub(#[from] epub_builder::Error),
    /// ZIP file operation errors
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    /// Blocking or async task panicked or was cancelled
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    KanshoBuilder(#[from] crate::kansho::KanshoConfigBuilderError),
    /// A source line could not be decoded with the configured encoding.
    /// `line` is 1-based.
    #[error("Line {line} is not valid {encoding}")]
    Decode { line: usize, encoding: String },
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// Error for unsupported operations or formats (e.g., unknown encoding label)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found (e.g., source file, cover image)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<&str> for Error {
    fn from(error: &str) -> Self {
        Error::Other(error.to_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
