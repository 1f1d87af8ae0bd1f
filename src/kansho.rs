use log::{info, warn};
use memmap2::MmapOptions;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::task::spawn_blocking;

use crate::chapter::Chapter;
use crate::classifier::{DEFAULT_CHAPTER_PATTERN, Patterns};
use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::generator::{Generator, epub::Epub, xhtml_zip::XhtmlZip};
use crate::hierarchy::segment_lines;
use crate::path_utils::{partial_file_path, sanitize_filename, title_from_source};
use crate::types::{
    EbookMetadata, FileFormat, FormatOptions, KanshoExecutionMode, SegmentedContent, TextEncoding,
};

/// The main Kansho conversion configuration, built declaratively using the builder pattern.
///
/// This struct holds everything needed to turn a plain-text manuscript into a
/// chapterized ebook: where the text comes from and how it is encoded, the
/// patterns that recognize chapter and sub-chapter headings, the formatting
/// policy for body lines, and where and how the container is written.
/// Once configured, it can execute the conversion through several entry points:
///
/// - [`convert_from_source`](KanshoConfig::convert_from_source): read, decode, segment and write
/// - [`convert_from_lines`](KanshoConfig::convert_from_lines): from already decoded lines
/// - [`convert_from_chapters`](KanshoConfig::convert_from_chapters): from already segmented chapters
/// - [`segment_source`](KanshoConfig::segment_source): segmentation only, no output
///
/// ## Builder Pattern
///
/// ```rust,no_run
/// # use kansho::prelude::*;
/// # use std::path::PathBuf;
/// let config = KanshoConfig::builder()
///     .metadata(EbookMetadata::default_with_title("My Novel".to_string()))
///     .source_path(PathBuf::from("./my_novel.txt"))
///     .target_path(PathBuf::from("./output"))
///     .encoding(TextEncoding::Utf8)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "specta", derive(specta::Type))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KanshoConfig {
    // --- Core Conversion Settings ---
    /// Ebook metadata embedded in the container.
    ///
    /// The title also names the output file and, unless
    /// [`default_chapter_title`](KanshoConfig::default_chapter_title) is set,
    /// the chapter holding any text before the first heading.
    #[builder(default = "EbookMetadata::default_with_title(\"Untitled Conversion\".to_string())")]
    pub metadata: EbookMetadata,

    /// Plain-text manuscript to convert.
    ///
    /// Required for [`convert_from_source`](KanshoConfig::convert_from_source) and
    /// [`segment_source`](KanshoConfig::segment_source).
    #[builder(default)]
    pub source_path: PathBuf,

    /// Target directory where the generated ebook is saved.
    ///
    /// If [`create_output_directory`](KanshoConfig::create_output_directory) is true,
    /// a subdirectory named after the ebook title is created here.
    #[builder(default)]
    pub target_path: PathBuf,

    /// Output container format.
    ///
    /// - [`FileFormat::Epub`]: EPUB 3 with a nested table of contents
    /// - [`FileFormat::XhtmlZip`]: zip archive of XHTML pages with an index
    #[builder(default = "FileFormat::Epub")]
    pub output_format: FileFormat,

    /// Output file name, with or without extension. Defaults to the sanitized title.
    #[builder(default)]
    pub output_file_name: Option<String>,

    /// Whether to create a subdirectory in the target path named after the ebook title.
    #[builder(default = "true")]
    pub create_output_directory: bool,

    // --- Segmentation Settings ---
    /// Character encoding of the manuscript.
    #[builder(default = "TextEncoding::Gb18030")]
    pub encoding: TextEncoding,

    /// Regex recognizing chapter headings. Matching lines become chapter titles.
    ///
    /// Defaults to headings such as `第十二章 回家`.
    #[builder(default = "DEFAULT_CHAPTER_PATTERN.to_string()")]
    pub chapter_pattern: String,

    /// Optional regex recognizing sub-chapter headings. Only consulted for
    /// lines that are not chapter headings. An empty pattern disables it.
    ///
    /// Example: chapters `^第.+卷` with sub-chapters `^第.+章`.
    #[builder(default)]
    pub sub_chapter_pattern: Option<String>,

    /// Title of the chapter holding the text before the first heading.
    /// Defaults to the book title.
    #[builder(default)]
    pub default_chapter_title: Option<String>,

    // --- Formatting Settings ---
    /// HTML-escape body lines. Disable only for manuscripts that already contain markup.
    #[builder(default = "true")]
    pub escape: bool,

    /// Wrap body lines in `<p>` elements instead of separating them with `<br/>`.
    #[builder(default = "false")]
    pub paragraph_mode: bool,

    // --- Container Settings ---
    /// Deflate entries of [`FileFormat::XhtmlZip`] archives. EPUB output is always deflated.
    #[builder(default = "false")]
    pub compress: bool,

    /// Cover image (JPEG, PNG or WebP) embedded into the container.
    #[builder(default)]
    pub cover_path: Option<PathBuf>,

    /// Leave out the leading placeholder chapter when it holds neither content
    /// nor sub-chapters, i.e. when the manuscript starts with a heading.
    /// Titled chapters are always kept, even without a body.
    #[builder(default = "true")]
    pub skip_empty_placeholder: bool,
}

impl KanshoConfig {
    /// Creates a new builder for configuring `KanshoConfig`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use kansho::prelude::*;
    /// # use std::path::PathBuf;
    /// let config = KanshoConfig::builder()
    ///     .metadata(EbookMetadata::default_with_title("My Book".to_string()))
    ///     .source_path(PathBuf::from("./book.txt"))
    ///     .target_path(PathBuf::from("./output"))
    ///     .sub_chapter_pattern(r"^第.+节")
    ///     .build()
    ///     .expect("Invalid configuration");
    /// ```
    pub fn builder() -> KanshoConfigBuilder {
        KanshoConfigBuilder::default()
    }

    /// Performs validation checks on the configuration for a specific execution mode.
    ///
    /// No content is read. All `convert_from_*` methods call this
    /// automatically, so manual invocation is optional but recommended for
    /// early error detection.
    ///
    /// # Arguments
    ///
    /// * `mode` - The intended execution mode:
    ///   - [`KanshoExecutionMode::FromSource`]: also checks that `source_path` is an existing file
    ///   - [`KanshoExecutionMode::FromLines`] / [`KanshoExecutionMode::FromChapters`]: title and target only
    pub fn preflight_check(&self, mode: KanshoExecutionMode) -> Result<&Self> {
        if self.metadata.title.is_empty() {
            return Err(Error::Other("Ebook title is required".to_string()));
        }
        if self.target_path.as_os_str().is_empty() {
            return Err(Error::Other("Target path is required".to_string()));
        }
        if let Some(cover_path) = &self.cover_path {
            if !cover_path.is_file() {
                return Err(Error::NotFound(format!(
                    "Cover image does not exist: {:?}",
                    cover_path
                )));
            }
        }

        match mode {
            KanshoExecutionMode::FromSource => self.validate_source()?,
            KanshoExecutionMode::FromLines | KanshoExecutionMode::FromChapters => {}
        }

        Ok(self)
    }

    fn validate_source(&self) -> Result<()> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Other(
                "`source_path` must be set for `FromSource` execution mode.".to_string(),
            ));
        }

        crate::path_utils::validate_path(&self.source_path)?;

        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        if !self.source_path.is_file() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path is not a file.".to_string(),
            ));
        }
        Ok(())
    }

    /// Compiles the configured chapter and sub-chapter patterns.
    pub fn patterns(&self) -> Result<Patterns> {
        Patterns::compile(&self.chapter_pattern, self.sub_chapter_pattern.as_deref())
    }

    /// The formatting policy applied to body lines.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            escape: self.escape,
            paragraph_mode: self.paragraph_mode,
        }
    }

    /// Title of the chapter collecting text before the first heading.
    pub fn initial_chapter_title(&self) -> &str {
        self.default_chapter_title
            .as_deref()
            .unwrap_or(&self.metadata.title)
    }

    // --- Segmentation entry points ---

    /// Segments already decoded lines without writing anything.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use kansho::prelude::*;
    /// # fn main() -> kansho::error::Result<()> {
    /// let config = KanshoConfig::builder()
    ///     .metadata(EbookMetadata::default_with_title("Demo".to_string()))
    ///     .chapter_pattern("^第.+章")
    ///     .build()?;
    ///
    /// let segmented = config.segment_lines(["Intro", "第一章 Start", "hello"])?;
    /// assert_eq!(segmented.chapters.len(), 2);
    /// assert_eq!(segmented.chapters[1].title(), "第一章 Start");
    /// # Ok(())
    /// # }
    /// ```
    pub fn segment_lines<I, L>(&self, lines: I) -> Result<SegmentedContent>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        let patterns = self.patterns()?;
        let mut chapters = Vec::new();
        let report = segment_lines(
            lines.into_iter().map(Ok),
            self.initial_chapter_title(),
            &patterns,
            self.format_options(),
            &mut chapters,
        )?;
        Ok(SegmentedContent { chapters, report })
    }

    /// Decodes raw manuscript bytes with the configured encoding and segments them.
    ///
    /// Stops at the first line that fails to decode.
    pub fn segment_bytes(&self, raw: &[u8]) -> Result<SegmentedContent> {
        let patterns = self.patterns()?;
        let decoder = Decoder::new(self.encoding);
        let mut chapters = Vec::new();
        let report = segment_lines(
            decoder.lines(raw),
            self.initial_chapter_title(),
            &patterns,
            self.format_options(),
            &mut chapters,
        )?;
        Ok(SegmentedContent { chapters, report })
    }

    /// Reads the configured `source_path` and segments it without writing anything.
    ///
    /// The file is memory-mapped; decoding and segmentation run on the blocking pool.
    pub async fn segment_source(&self) -> Result<SegmentedContent> {
        self.validate_source()?;

        let file = fs::File::open(&self.source_path).await?;
        let file_len = file.metadata().await?.len();
        let file_std = file.into_std().await;
        let config = self.clone();

        spawn_blocking(move || {
            if file_len == 0 {
                return config.segment_bytes(&[]);
            }
            // Safety: the manuscript is opened read-only and only read while mapped
            let mmap = unsafe { MmapOptions::new().map(&file_std) }?;
            config.segment_bytes(&mmap[..])
        })
        .await?
    }

    // --- Core conversion entry points ---

    /// Runs the full pipeline: read, decode, segment, write.
    ///
    /// Returns the path of the written container.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use kansho::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> kansho::error::Result<()> {
    /// let config = KanshoConfig::builder()
    ///     .metadata(EbookMetadata::default_with_title("My Novel".to_string()))
    ///     .source_path(PathBuf::from("./novel.txt"))
    ///     .target_path(PathBuf::from("./output"))
    ///     .build()?;
    ///
    /// let written = config.convert_from_source().await?;
    /// println!("Wrote {:?}", written);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn convert_from_source(self) -> Result<PathBuf> {
        self.preflight_check(KanshoExecutionMode::FromSource)?;
        info!(
            "Converting '{}' ({}) to {:?}",
            self.source_path.display(),
            self.encoding,
            self.output_format
        );
        let segmented = self.segment_source().await?;
        info!(
            "Segmented {} lines into {} chapters and {} sub-chapters",
            segmented.report.lines_processed,
            segmented.report.chapters_emitted,
            segmented.report.sub_chapters_emitted
        );

        Self::perform_generation(&self, segmented.chapters).await
    }

    /// Converts already decoded lines (UTF-8) into a container.
    pub async fn convert_from_lines<I, L>(self, lines: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        self.preflight_check(KanshoExecutionMode::FromLines)?;
        let segmented = self.segment_lines(lines)?;
        Self::perform_generation(&self, segmented.chapters).await
    }

    /// Writes already segmented chapters into a container.
    pub async fn convert_from_chapters(self, chapters: Vec<Chapter>) -> Result<PathBuf> {
        self.preflight_check(KanshoExecutionMode::FromChapters)?;
        Self::perform_generation(&self, chapters).await
    }

    // --- Private helper methods for pipeline steps ---

    /// Resolves the output directory, drops the empty placeholder and dispatches
    /// to the format-specific generator. A failed generation leaves no output.
    async fn perform_generation(config: &KanshoConfig, chapters: Vec<Chapter>) -> Result<PathBuf> {
        let target_directory_path = if config.create_output_directory {
            let path = config
                .target_path
                .join(sanitize_filename(&config.metadata.title));
            if !path.exists() {
                fs::create_dir_all(&path).await?;
            }
            path
        } else {
            if !config.target_path.exists() {
                return Err(Error::NotFound(
                    "Target directory does not exist".to_string(),
                ));
            }
            config.target_path.clone()
        };

        let chapters = if config.skip_empty_placeholder {
            drop_empty_placeholder(chapters)
        } else {
            chapters
        };
        if chapters.is_empty() {
            return Err(Error::Other("No chapters found for generation.".to_string()));
        }
        if chapters.len() == 1 && chapters[0].title() == config.initial_chapter_title() {
            warn!(
                "No chapter headings matched '{}'; the whole text is a single chapter",
                config.chapter_pattern
            );
        }

        let file_name_base = config
            .output_file_name
            .as_deref()
            .map(sanitize_filename)
            .unwrap_or_else(|| sanitize_filename(&config.metadata.title));

        let written = match config.output_format {
            FileFormat::Epub => {
                let generator = Epub::new(&target_directory_path, &file_name_base)?;
                Self::generate_with(config, generator, &chapters).await
            }
            FileFormat::XhtmlZip => {
                let mut generator = XhtmlZip::new(&target_directory_path, &file_name_base)?;
                generator.compression(config.compress);
                Self::generate_with(config, generator, &chapters).await
            }
        }?;

        info!("Conversion complete: '{}'", written.display());
        Ok(written)
    }

    async fn generate_with<G>(
        config: &KanshoConfig,
        mut generator: G,
        chapters: &[Chapter],
    ) -> Result<PathBuf>
    where
        G: Generator + Send,
    {
        let partial_path = partial_file_path(generator.output_path());

        let result = async {
            if let Some(cover_path) = &config.cover_path {
                generator.set_cover(cover_path).await?;
            }
            generator.set_metadata(&config.metadata).await?;
            for chapter in chapters {
                generator.add_chapter(chapter).await?;
            }
            generator.save().await
        }
        .await;

        if result.is_err() {
            remove_partial_output(&partial_path).await;
        }
        result
    }
}

/// Removes the leading chapter when it is empty. Only the first chapter can be
/// the untitled placeholder; empty chapters further in came from a heading.
fn drop_empty_placeholder(mut chapters: Vec<Chapter>) -> Vec<Chapter> {
    if chapters.first().is_some_and(Chapter::is_empty) {
        let placeholder = chapters.remove(0);
        warn!("Skipping empty leading chapter '{}'", placeholder.title());
    }
    chapters
}

async fn remove_partial_output(partial_path: &Path) {
    if fs::try_exists(partial_path).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(partial_path).await {
            warn!(
                "Could not remove partial output '{}': {}",
                partial_path.display(),
                e
            );
        }
    }
}

impl KanshoConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(pattern) = &self.chapter_pattern {
            if regex::bytes::Regex::new(pattern).is_err() {
                return Err(format!("Invalid chapter_pattern: {}", pattern));
            }
        }
        if let Some(Some(pattern)) = &self.sub_chapter_pattern {
            if !pattern.is_empty() && regex::bytes::Regex::new(pattern).is_err() {
                return Err(format!("Invalid sub_chapter_pattern: {}", pattern));
            }
        }
        if let Some(Some(title)) = &self.output_file_name {
            if title.trim().is_empty() {
                return Err("output_file_name must not be blank".to_string());
            }
        }

        Ok(())
    }

    /// Uses the manuscript's file name as the book title when no metadata has
    /// been set yet (`novel.txt` -> `novel`).
    pub fn title_from_source(&mut self) -> &mut Self {
        if self.metadata.is_none() {
            if let Some(title) = self.source_path.as_ref().and_then(|p| title_from_source(p)) {
                self.metadata = Some(EbookMetadata::default_with_title(title));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FormatOptions;

    fn with_body(title: &str) -> Chapter {
        let mut chapter = Chapter::new(title);
        chapter.append(b"body", &FormatOptions::default());
        chapter
    }

    #[test]
    fn test_drop_empty_placeholder_keeps_titled_empty_chapters() {
        let chapters = vec![
            Chapter::new("Placeholder"),
            with_body("第一章"),
            Chapter::new("第二章"),
            with_body("第三章"),
        ];

        let kept = drop_empty_placeholder(chapters);
        let titles: Vec<&str> = kept.iter().map(|c| c.title()).collect();
        assert_eq!(titles, vec!["第一章", "第二章", "第三章"]);
    }

    #[test]
    fn test_drop_empty_placeholder_keeps_placeholder_with_content() {
        let kept = drop_empty_placeholder(vec![with_body("Placeholder"), Chapter::new("第一章")]);
        assert_eq!(kept.len(), 2);
        assert!(drop_empty_placeholder(vec![Chapter::new("Placeholder")]).is_empty());
    }
}
