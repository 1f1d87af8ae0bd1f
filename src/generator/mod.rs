//! Generator module provides traits and implementations for container writers.
//!
//! This module contains the common interface for ebook generators and specific
//! implementations for different file formats. Generators consume closed
//! chapters in input order and write a single output file.

use crate::chapter::Chapter;
use crate::error::Result;
use crate::types::EbookMetadata;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

pub mod epub;
pub mod xhtml_zip;

const SECTION_TEMPLATE: &str = include_str!("../../templates/Chapter.xhtml");

/// Shared stylesheet for every generated page.
pub(crate) const STYLESHEET: &[u8] = include_bytes!("../../templates/Epub.css");

/// Common interface for all container generators.
///
/// The `Generator` trait defines a consistent API for writers that package a
/// chapter hierarchy into different file formats (EPUB, XHTML zip).
/// Implementations write to a temporary `.part` file and only move it to its
/// final name in [`save`](Generator::save).
#[async_trait]
pub trait Generator {
    /// Creates a new generator instance.
    ///
    /// # Parameters
    /// * `output_dir` - Directory where the generated file will be saved
    /// * `base_filename` - Base name of the output file (without extension)
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self>
    where
        Self: Sized;

    /// Final path of the container once [`save`](Generator::save) succeeds.
    fn output_path(&self) -> &Path;

    /// Embeds a cover image. Must be called before any chapter is added.
    async fn set_cover(&mut self, cover_path: &Path) -> Result<&mut Self>
    where
        Self: Sized;

    /// Sets book-level metadata (title, authors, language, ...).
    async fn set_metadata(&mut self, metadata: &EbookMetadata) -> Result<&mut Self>
    where
        Self: Sized;

    /// Adds a closed chapter and its sub-chapters, in creation order.
    async fn add_chapter(&mut self, chapter: &Chapter) -> Result<&mut Self>
    where
        Self: Sized;

    /// Finalizes the document and moves it to [`output_path`](Generator::output_path).
    async fn save(self) -> Result<PathBuf>;
}

lazy_static! {
    /// A `%name%` slot in a page template.
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"%(\w+)%").unwrap();
}

/// Fills every `%name%` slot of `template` in a single pass.
///
/// Inserted values are never scanned again, so titles or bodies that contain
/// placeholder-like text come through verbatim. Slots for which `lookup`
/// returns `None` are left untouched.
///
/// # Arguments
///
/// * `template` - Template text with `%name%` slots
/// * `lookup` - Returns the replacement for a slot name
pub(crate) fn fill_template<'a, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<Cow<'a, str>>,
{
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures| match lookup(&caps[1]) {
            Some(value) => value.into_owned(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Renders one section as a standalone XHTML page.
///
/// `content` is the already formatted body; it is inserted as-is. The title is
/// escaped. `level` is the heading level (1 for chapters, 2 for sub-chapters).
pub(crate) fn render_section(
    title: &str,
    level: u8,
    content: &[u8],
    language: &str,
    stylesheet_href: &str,
) -> String {
    let title = html_escape::encode_text(title);
    let language = html_escape::encode_double_quoted_attribute(language);
    let level = level.to_string();
    let body = String::from_utf8_lossy(content);

    fill_template(SECTION_TEMPLATE, |name| match name {
        "title" => Some(Cow::Borrowed(&*title)),
        "lang" => Some(Cow::Borrowed(&*language)),
        "level" => Some(Cow::Borrowed(level.as_str())),
        "stylesheet" => Some(Cow::Borrowed(stylesheet_href)),
        "body" => Some(Cow::Borrowed(&*body)),
        _ => None,
    })
}
