//! Kansho - Plain Text to Ebook Conversion Library
//!
//! This crate splits plain-text manuscripts (typically web novels) into a
//! chapter hierarchy by matching heading lines against regular expressions,
//! and packages the result into ebook containers (EPUB or a zip of XHTML pages).
//!
//! The segmentation engine is a single forward pass: every line is decoded,
//! classified as chapter heading, sub-chapter heading or body text, and
//! appended to the chapter that is currently open. Closed chapters are handed
//! to a [`hierarchy::ChapterSink`] in input order.
//!
//! # Getting Started
//!
//! Define your conversion task by configuring [`KanshoConfig`] via its builder,
//! then execute it with one of the `convert_from_*` methods.
//!
//! ```rust,no_run
//! use kansho::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> kansho::error::Result<()> {
//!     // 1. Define the metadata for your ebook
//!     let metadata = EbookMetadata {
//!         title: "斗破苍穹".to_string(),
//!         authors: vec!["天蚕土豆".to_string()],
//!         ..EbookMetadata::default_with_title(String::new())
//!     };
//!
//!     // 2. Configure your conversion task using the builder
//!     let config = KanshoConfig::builder()
//!         .metadata(metadata)
//!         .source_path(PathBuf::from("./novels/doupo.txt"))
//!         .target_path(PathBuf::from("./converted_ebooks"))
//!         .encoding(TextEncoding::Gb18030)
//!         .sub_chapter_pattern(r"^第[零一二三四五六七八九十百千两\d]+节")
//!         .output_format(FileFormat::Epub)
//!         .build()?;
//!
//!     // Optional: Run a pre-flight check for the intended mode
//!     config.preflight_check(KanshoExecutionMode::FromSource)?;
//!
//!     // 3. Execute the full conversion pipeline from the source path
//!     let written = config.convert_from_source().await?;
//!     println!("Conversion complete: {:?}", written);
//!
//!     Ok(())
//! }
//! ```
//!
//! The segmentation engine can also be driven directly through
//! [`hierarchy::segment_lines`] with any [`hierarchy::ChapterSink`].

pub mod chapter;
pub mod classifier;
pub mod decoder;
pub mod error;
pub mod generator;
pub mod hierarchy;
pub mod kansho;
pub mod path_utils;
pub mod types;

// Publicly expose the main `KanshoConfig` struct and its builder
pub use kansho::KanshoConfig;
pub use kansho::KanshoConfigBuilder;

// Re-export the segmentation building blocks
pub use chapter::{Chapter, Section};
pub use classifier::{DEFAULT_CHAPTER_PATTERN, LineMatcher, Patterns, classify};
pub use hierarchy::{ChapterSink, Hierarchy, HierarchyState, segment_lines};

// Re-export core types for direct access
pub use types::{
    EbookMetadata, FileFormat, FormatOptions, KanshoExecutionMode, LineKind, SegmentReport,
    SegmentedContent, TextEncoding,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use kansho::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        Chapter, ChapterSink, DEFAULT_CHAPTER_PATTERN, EbookMetadata, FileFormat, FormatOptions,
        Hierarchy, HierarchyState, KanshoConfig, KanshoConfigBuilder, KanshoExecutionMode,
        LineKind, LineMatcher, Patterns, Section, SegmentReport, SegmentedContent, TextEncoding,
        classify, error, generator, segment_lines, types,
    };
    pub use crate::decoder::Decoder;
    pub use std::path::{Path, PathBuf};
}
