use std::fs::File;
use std::path::{Path, PathBuf};

use crate::chapter::{Chapter, Section};
use crate::error::{Error, Result};
use crate::generator::{Generator, STYLESHEET, render_section};
use crate::path_utils::{normalize_path, output_file_path, partial_file_path, path_to_string_lossy};
use crate::types::{EbookMetadata, FileFormat, get_file_info};
use async_trait::async_trait;
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use log::debug;
use tokio::task::spawn_blocking;

/// Stylesheet location relative to chapter pages inside the EPUB.
const STYLESHEET_HREF: &str = "../stylesheet.css";

/// A generator for creating EPUB 3 files from chapterized text.
///
/// Every chapter becomes one XHTML document at TOC level 1, every sub-chapter
/// its own document at TOC level 2 directly after its parent.
pub struct Epub {
    epub: EpubBuilder<ZipLibrary>,
    output_path: PathBuf,
    language: String,
    chapter_count: usize,
}

impl Epub {
    fn add_section(
        &mut self,
        href: String,
        section: &Section,
        level: u8,
        reftype: Option<ReferenceType>,
    ) -> Result<()> {
        let xhtml = render_section(
            section.title(),
            level,
            section.content(),
            &self.language,
            STYLESHEET_HREF,
        );
        let mut content = EpubContent::new(href, xhtml.as_bytes())
            .title(section.title())
            .level(i32::from(level));
        if let Some(reftype) = reftype {
            content = content.reftype(reftype);
        }
        self.epub.add_content(content)?;
        Ok(())
    }
}

#[async_trait]
impl Generator for Epub {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        let mut epub = EpubBuilder::new(ZipLibrary::new()?)?;

        epub.epub_version(EpubVersion::V30);
        epub.stylesheet(STYLESHEET)?;
        epub.inline_toc();

        let normalized_output_dir = normalize_path(output_dir)?;
        if !normalized_output_dir.exists() {
            std::fs::create_dir_all(&normalized_output_dir)?;
        }

        Ok(Epub {
            epub,
            output_path: output_file_path(&normalized_output_dir, base_filename, FileFormat::Epub),
            language: "zh".to_string(), // Default, will be updated by set_metadata
            chapter_count: 0,
        })
    }

    fn output_path(&self) -> &Path {
        &self.output_path
    }

    async fn set_cover(&mut self, cover_path: &Path) -> Result<&mut Self> {
        if self.chapter_count > 0 {
            return Err(Error::Unsupported(
                "Cover must be set before chapters are added".to_string(),
            ));
        }

        let normalized_path = normalize_path(cover_path).map_err(|e| {
            Error::InvalidPath(
                cover_path.to_path_buf(),
                format!("Failed to normalize cover image path: {}", e),
            )
        })?;

        let (cover_extension, cover_mime) = get_file_info(&normalized_path)?;

        let cover_file = File::open(&normalized_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open cover image '{}': {}",
                    path_to_string_lossy(&normalized_path),
                    e
                ),
            ))
        })?;

        self.epub.add_cover_image(
            format!("images/cover.{}", cover_extension),
            cover_file,
            cover_mime,
        )?;
        Ok(self)
    }

    async fn set_metadata(&mut self, metadata: &EbookMetadata) -> Result<&mut Self> {
        self.epub.metadata("title", &metadata.title)?;
        for author in &metadata.authors {
            self.epub.metadata("author", author)?;
        }

        if !metadata.language.is_empty() {
            self.language = metadata.language.clone();
        }
        self.epub.set_lang(&self.language);

        if let Some(description) = &metadata.description {
            self.epub.metadata("description", description)?;
        }
        for tag in &metadata.tags {
            self.epub.metadata("subject", tag)?;
        }
        self.epub
            .metadata("generator", concat!("kansho ", env!("CARGO_PKG_VERSION")))?;

        Ok(self)
    }

    async fn add_chapter(&mut self, chapter: &Chapter) -> Result<&mut Self> {
        self.chapter_count += 1;
        let index = self.chapter_count;

        let reftype = (index == 1).then_some(ReferenceType::Text);
        self.add_section(
            format!("chapters/chapter_{:03}.xhtml", index),
            chapter.section(),
            1,
            reftype,
        )?;

        for (sub_index, sub_chapter) in chapter.sub_chapters().iter().enumerate() {
            self.add_section(
                format!("chapters/chapter_{:03}_{:02}.xhtml", index, sub_index + 1),
                sub_chapter,
                2,
                None,
            )?;
        }
        Ok(self)
    }

    async fn save(self) -> Result<PathBuf> {
        let output_path = self.output_path;
        let partial_path = partial_file_path(&output_path);
        let mut epub = self.epub;

        let file = File::create(&partial_path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create EPUB file '{}': {}",
                    path_to_string_lossy(&partial_path),
                    e
                ),
            ))
        })?;

        spawn_blocking(move || epub.generate(file).map_err(Error::Epub)).await??;

        tokio::fs::rename(&partial_path, &output_path).await?;
        debug!(
            "Wrote EPUB with {} chapters to '{}'",
            self.chapter_count,
            path_to_string_lossy(&output_path)
        );
        Ok(output_path)
    }
}
