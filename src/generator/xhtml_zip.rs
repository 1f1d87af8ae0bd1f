use crate::chapter::{Chapter, Section};
use crate::error::{Error, Result};
use crate::generator::{Generator, STYLESHEET, fill_template, render_section};
use crate::path_utils::{normalize_path, output_file_path, partial_file_path, path_to_string_lossy};
use crate::types::{EbookMetadata, FileFormat, get_file_info};
use async_trait::async_trait;
use chrono::prelude::*;
use log::debug;
use memmap2::MmapOptions;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const INDEX_TEMPLATE: &str = include_str!("../../templates/Index.xhtml");

/// One line of the table of contents in `index.xhtml`.
struct TocEntry {
    href: String,
    title: String,
    sub_entries: Vec<(String, String)>,
}

/// A generator for a plain zip archive of XHTML pages.
///
/// Layout: `index.xhtml` (metadata and linked table of contents),
/// `style.css`, `chapters/chapter_NNN.xhtml` and
/// `chapters/chapter_NNN_MM.xhtml` for sub-chapters, plus an optional
/// `cover.<ext>`.
pub struct XhtmlZip {
    zip: Option<ZipWriter<File>>,
    options: SimpleFileOptions,
    output_path: PathBuf,
    metadata: EbookMetadata,
    cover_entry: Option<String>,
    toc: Vec<TocEntry>,
}

impl XhtmlZip {
    /// Chooses between deflated (`true`) and stored entries. Applies to
    /// entries written after the call.
    pub fn compression(&mut self, compress: bool) -> &mut Self {
        let method = if compress {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        self.options = self.options.compression_method(method);
        self
    }

    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let options = self.options;
        let zip = self
            .zip
            .as_mut()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))?;
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
        Ok(())
    }

    fn write_section(&mut self, href: &str, section: &Section, level: u8) -> Result<()> {
        let xhtml = render_section(
            section.title(),
            level,
            section.content(),
            &self.metadata.language,
            "../style.css",
        );
        self.write_entry(href, xhtml.as_bytes())
    }

    fn render_index(&self) -> String {
        let escape = |text: &str| html_escape::encode_double_quoted_attribute(text).into_owned();

        let mut toc = String::new();
        for entry in &self.toc {
            toc.push_str(&format!(
                "      <li><a href=\"{}\">{}</a>",
                entry.href,
                html_escape::encode_text(&entry.title)
            ));
            if !entry.sub_entries.is_empty() {
                toc.push_str("\n        <ol>\n");
                for (href, title) in &entry.sub_entries {
                    toc.push_str(&format!(
                        "          <li><a href=\"{}\">{}</a></li>\n",
                        href,
                        html_escape::encode_text(title)
                    ));
                }
                toc.push_str("        </ol>\n      ");
            }
            toc.push_str("</li>\n");
        }

        let cover = match &self.cover_entry {
            Some(entry) => format!("  <img class=\"cover\" src=\"{}\" alt=\"cover\"/>\n", entry),
            None => String::new(),
        };

        let language = if self.metadata.language.is_empty() {
            "zh"
        } else {
            self.metadata.language.as_str()
        };
        let release_date = self.metadata.release_date.unwrap_or_else(Utc::now);

        let title = escape(&self.metadata.title);
        let language = escape(language);
        let authors = escape(&self.metadata.authors.join(", "));
        let description = escape(self.metadata.description.as_deref().unwrap_or(""));
        let tags = escape(&self.metadata.tags.join(", "));
        let date = release_date.format("%Y-%m-%d").to_string();

        fill_template(INDEX_TEMPLATE, |name| {
            let value = match name {
                "title" => &title,
                "lang" => &language,
                "authors" => &authors,
                "description" => &description,
                "tags" => &tags,
                "date" => &date,
                "cover" => &cover,
                "toc" => &toc,
                _ => return None,
            };
            Some(Cow::Borrowed(value.as_str()))
        })
    }
}

#[async_trait]
impl Generator for XhtmlZip {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        let options: SimpleFileOptions = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o644);

        let normalized_output_dir = normalize_path(output_dir)?;
        if !normalized_output_dir.exists() {
            std::fs::create_dir_all(&normalized_output_dir)?;
        }

        let output_path =
            output_file_path(&normalized_output_dir, base_filename, FileFormat::XhtmlZip);
        let file = File::create(partial_file_path(&output_path))?;

        Ok(XhtmlZip {
            zip: Some(ZipWriter::new(file)),
            options,
            output_path,
            metadata: EbookMetadata::default(),
            cover_entry: None,
            toc: Vec::new(),
        })
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn set_cover(&mut self, cover_path: &Path) -> Result<&mut Self> {
        if self.cover_entry.is_some() {
            return Err(Error::Unsupported("Cover already set".to_string()));
        }
        if !self.toc.is_empty() {
            return Err(Error::Unsupported(
                "Cover must be set before chapters are added".to_string(),
            ));
        }

        let normalized_path = normalize_path(cover_path).map_err(|e| {
            Error::InvalidPath(
                cover_path.to_path_buf(),
                format!("Failed to normalize cover path: {}", e),
            )
        })?;

        let (cover_extension, _) = get_file_info(&normalized_path)?;

        let file = fs::File::open(&normalized_path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open cover file '{}': {}",
                    path_to_string_lossy(&normalized_path),
                    e
                ),
            ))
        })?;
        let file_std = file.into_std().await;

        // Safety: the cover is opened read-only and only read while mapped
        let mmap = spawn_blocking(move || unsafe { MmapOptions::new().map(&file_std) }).await??;

        let entry = format!("cover.{}", cover_extension);
        self.write_entry(&entry, &mmap[..])?;
        self.cover_entry = Some(entry);

        Ok(self)
    }

    async fn set_metadata(&mut self, metadata: &EbookMetadata) -> Result<&mut Self> {
        self.metadata = metadata.clone();
        Ok(self)
    }

    async fn add_chapter(&mut self, chapter: &Chapter) -> Result<&mut Self> {
        let index = self.toc.len() + 1;
        let href = format!("chapters/chapter_{:03}.xhtml", index);
        self.write_section(&href, chapter.section(), 1)?;

        let mut sub_entries = Vec::with_capacity(chapter.sub_chapters().len());
        for (sub_index, sub_chapter) in chapter.sub_chapters().iter().enumerate() {
            let sub_href = format!("chapters/chapter_{:03}_{:02}.xhtml", index, sub_index + 1);
            self.write_section(&sub_href, sub_chapter, 2)?;
            sub_entries.push((sub_href, sub_chapter.title().to_string()));
        }

        self.toc.push(TocEntry {
            href,
            title: chapter.title().to_string(),
            sub_entries,
        });
        Ok(self)
    }

    async fn save(mut self) -> Result<PathBuf> {
        let index = self.render_index();
        self.write_entry("style.css", STYLESHEET)?;
        self.write_entry("index.xhtml", index.as_bytes())?;

        let zip = self
            .zip
            .take()
            .ok_or_else(|| Error::Unsupported("Zip writer not available".to_string()))?;

        spawn_blocking(move || zip.finish().map(|_| ()).map_err(Error::Zip)).await??;

        fs::rename(partial_file_path(&self.output_path), &self.output_path).await?;
        debug!(
            "Wrote XHTML archive with {} chapters to '{}'",
            self.toc.len(),
            path_to_string_lossy(&self.output_path)
        );
        Ok(self.output_path)
    }
}
