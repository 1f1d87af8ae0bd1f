//! Core data types, enums, and reports for the Kansho conversion library.
//!
//! This module defines the fundamental data structures used throughout Kansho:
//! - Formatting switches for accumulated content (`FormatOptions`)
//! - Line classification results (`LineKind`)
//! - Source encodings and output formats (`TextEncoding`, `FileFormat`)
//! - Comprehensive metadata (`EbookMetadata`)
//! - Reporting types (`SegmentReport`, `SegmentedContent`)

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::chapter::Chapter;
use crate::error::{Error, Result};

/// Content-formatting policy applied to every appended line.
///
/// Fixed for the duration of one conversion run and passed explicitly to every
/// append; there is no process-wide formatting state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct FormatOptions {
    /// HTML-escape `&`, `<`, `>`, `"` and `'` before formatting.
    pub escape: bool,
    /// Wrap non-blank lines in `<p>..</p>` instead of prefixing `<br/>`.
    pub paragraph_mode: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            escape: true,
            paragraph_mode: false,
        }
    }
}

/// Classification of a single decoded line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LineKind {
    /// The line opens a new top-level chapter.
    Chapter,
    /// The line opens a new sub-chapter inside the current chapter.
    SubChapter,
    /// Ordinary body text.
    Content,
}

/// Character encoding of the source manuscript.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum TextEncoding {
    #[cfg_attr(feature = "serde", serde(rename = "UTF-8"))]
    Utf8,
    #[cfg_attr(feature = "serde", serde(rename = "GBK"))]
    Gbk,
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "GB18030"))]
    Gb18030,
}

impl TextEncoding {
    /// The `encoding_rs` codec backing this encoding.
    pub fn codec(&self) -> &'static encoding_rs::Encoding {
        match self {
            TextEncoding::Utf8 => encoding_rs::UTF_8,
            TextEncoding::Gbk => encoding_rs::GBK,
            TextEncoding::Gb18030 => encoding_rs::GB18030,
        }
    }

    /// Canonical display label, as used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Gbk => "GBK",
            TextEncoding::Gb18030 => "GB18030",
        }
    }
}

impl FromStr for TextEncoding {
    type Err = Error;

    /// Parses the encoding labels accepted on the command line of older
    /// converters. An empty label means UTF-8.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GB18030" | "gb18030" => Ok(TextEncoding::Gb18030),
            "GBK" | "gbk" => Ok(TextEncoding::Gbk),
            "UTF8" | "utf8" | "utf-8" | "UTF-8" | "" => Ok(TextEncoding::Utf8),
            other => Err(Error::Unsupported(format!(
                "encoding '{}' (supported: GB18030, GBK, UTF-8)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Defines the output container format for the generated ebook.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub enum FileFormat {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "EPUB"))]
    Epub,
    /// A plain zip archive of XHTML chapter pages with an `index.xhtml`.
    #[cfg_attr(feature = "serde", serde(rename = "XHTML_ZIP"))]
    XhtmlZip,
}

impl FileFormat {
    /// File extension (without dot) of the produced container.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Epub => "epub",
            FileFormat::XhtmlZip => "zip",
        }
    }
}

/// Metadata for an ebook, embedded into the output container.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct EbookMetadata {
    pub title: String,
    pub authors: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>, // Subjects
    pub language: String,  // e.g., "zh", "en"
    pub identifier: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub custom_fields: HashMap<String, String>,
}

impl EbookMetadata {
    /// Creates a default `EbookMetadata` instance with a specified title and default language "zh".
    pub fn default_with_title(title: String) -> Self {
        Self {
            title,
            language: "zh".to_string(),
            ..Default::default()
        }
    }
}

/// Counters collected while segmenting a manuscript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
pub struct SegmentReport {
    pub lines_processed: usize,
    pub chapters_emitted: usize,
    pub sub_chapters_emitted: usize,
    pub content_bytes: usize,
}

/// Outcome of the segmentation phase: the closed chapters in input order and
/// the report describing them.
#[derive(Debug, Clone)]
pub struct SegmentedContent {
    pub chapters: Vec<Chapter>,
    pub report: SegmentReport,
}

/// Specifies the intended starting point for a Kansho conversion.
/// Used by `KanshoConfig::preflight_check` to tailor validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KanshoExecutionMode {
    /// The conversion reads, decodes and segments the configured `source_path`.
    FromSource,
    /// The conversion starts with caller-supplied, already decoded lines.
    FromLines,
    /// The conversion starts with caller-supplied, already segmented chapters.
    FromChapters,
}

/// Utility function: determines file extension and MIME type of a cover image.
///
/// # Supported formats
///
/// - JPEG/JPG: image/jpeg
/// - PNG: image/png
/// - WebP: image/webp
pub fn get_file_info(image_path: &Path) -> Result<(&'static str, &'static str)> {
    let extension = image_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => Ok(("jpg", "image/jpeg")),
        Some("png") => Ok(("png", "image/png")),
        Some("webp") => Ok(("webp", "image/webp")),
        _ => Err(Error::Unsupported(format!("Image format {:#?}", extension))),
    }
}
