//! The chapter hierarchy state machine.
//!
//! [`Hierarchy`] owns the chapter currently being built. Each classified line
//! either flushes that chapter to a [`ChapterSink`] and opens a new one, opens
//! a sub-chapter inside it, or appends content to its innermost open section.
//! [`segment_lines`] drives the whole loop over a line source.

use log::{debug, trace};

use crate::chapter::{Chapter, Section};
use crate::classifier::Patterns;
use crate::error::Result;
use crate::types::{FormatOptions, LineKind, SegmentReport};

/// Receives closed chapters, in input order.
///
/// Every chapter is offered exactly once, including the initial placeholder
/// chapter even when it is empty. An error aborts the run.
pub trait ChapterSink {
    /// Takes ownership of a closed chapter and its sub-chapters.
    fn emit_chapter(&mut self, chapter: Chapter) -> Result<()>;
}

impl ChapterSink for Vec<Chapter> {
    fn emit_chapter(&mut self, chapter: Chapter) -> Result<()> {
        self.push(chapter);
        Ok(())
    }
}

/// Observable state of the [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyState {
    /// Only the placeholder chapter with the default title is open.
    NoChapterOpen,
    /// A chapter opened by a heading line is open, without sub-chapters.
    ChapterOpen,
    /// The current chapter has at least one sub-chapter; the latest is open.
    ChapterWithSubOpen,
}

/// Incremental chapter builder driven one classified line at a time.
///
/// Holds the chapter currently being filled, the formatting policy of the run
/// and the counters reported by [`finish`](Hierarchy::finish). Closed
/// chapters go to a [`ChapterSink`] as soon as the next chapter heading
/// arrives.
#[derive(Debug)]
pub struct Hierarchy {
    current: Chapter,
    options: FormatOptions,
    seen_chapter_heading: bool,
    report: SegmentReport,
}

impl Hierarchy {
    /// Starts with a placeholder chapter titled `default_title`.
    pub fn new(default_title: impl Into<String>, options: FormatOptions) -> Self {
        Self {
            current: Chapter::new(default_title),
            options,
            seen_chapter_heading: false,
            report: SegmentReport::default(),
        }
    }

    /// Where the driver stands: before any heading, inside a chapter, or
    /// inside a sub-chapter of the current chapter.
    pub fn state(&self) -> HierarchyState {
        if !self.current.sub_chapters().is_empty() {
            HierarchyState::ChapterWithSubOpen
        } else if self.seen_chapter_heading {
            HierarchyState::ChapterOpen
        } else {
            HierarchyState::NoChapterOpen
        }
    }

    /// The chapter currently being built.
    pub fn current(&self) -> &Chapter {
        &self.current
    }

    /// Formatting policy applied to every content line.
    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    /// Counters for the chapters flushed so far.
    pub fn report(&self) -> &SegmentReport {
        &self.report
    }

    /// Applies one already classified line.
    ///
    /// # Arguments
    ///
    /// * `line` - The decoded line; for headings it becomes the new title
    /// * `kind` - Result of classifying `line`
    /// * `sink` - Receives the previous chapter when `kind` is a chapter heading
    ///
    /// # Errors
    ///
    /// Returns whatever the sink returns; the run should stop there.
    pub fn feed<S>(&mut self, line: &[u8], kind: LineKind, sink: &mut S) -> Result<()>
    where
        S: ChapterSink + ?Sized,
    {
        self.report.lines_processed += 1;
        match kind {
            LineKind::Chapter => {
                let previous = std::mem::replace(&mut self.current, Chapter::from_line(line));
                self.seen_chapter_heading = true;
                self.flush(previous, sink)?;
            }
            LineKind::SubChapter => {
                let sub_chapter = Section::from_line(line);
                trace!(
                    "Opening sub-chapter '{}' in '{}'",
                    sub_chapter.title(),
                    self.current.title()
                );
                self.current.add_sub_chapter(sub_chapter);
            }
            LineKind::Content => self.current.append(line, &self.options),
        }
        Ok(())
    }

    /// Flushes the current chapter without opening a replacement and returns
    /// the counters for the whole run.
    pub fn finish<S>(mut self, sink: &mut S) -> Result<SegmentReport>
    where
        S: ChapterSink + ?Sized,
    {
        let last = std::mem::replace(&mut self.current, Chapter::new(String::new()));
        self.flush(last, sink)?;
        Ok(self.report)
    }

    fn flush<S>(&mut self, chapter: Chapter, sink: &mut S) -> Result<()>
    where
        S: ChapterSink + ?Sized,
    {
        let sub_chapters = chapter.sub_chapters().len();
        let bytes = chapter.content().len()
            + chapter
                .sub_chapters()
                .iter()
                .map(|s| s.content().len())
                .sum::<usize>();
        debug!(
            "Flushing chapter '{}' ({} bytes, {} sub-chapters)",
            chapter.title(),
            bytes,
            sub_chapters
        );

        sink.emit_chapter(chapter)?;

        self.report.chapters_emitted += 1;
        self.report.sub_chapters_emitted += sub_chapters;
        self.report.content_bytes += bytes;
        Ok(())
    }
}

/// Segments a sequence of decoded lines into chapters.
///
/// Lines are consumed strictly in order. The first `Err` item aborts the run
/// before the failing line reaches the hierarchy; nothing more is flushed in
/// that case.
///
/// # Arguments
///
/// * `lines` - Decoded lines, each possibly a decode failure
/// * `default_title` - Title of the chapter holding text before the first heading
/// * `patterns` - Chapter and sub-chapter heading patterns
/// * `options` - Formatting policy for content lines
/// * `sink` - Receives every closed chapter in input order
///
/// # Returns
///
/// The counters of the whole run once the last chapter has been flushed.
pub fn segment_lines<I, L, S>(
    lines: I,
    default_title: &str,
    patterns: &Patterns,
    options: FormatOptions,
    sink: &mut S,
) -> Result<SegmentReport>
where
    I: IntoIterator<Item = Result<L>>,
    L: AsRef<[u8]>,
    S: ChapterSink + ?Sized,
{
    let mut hierarchy = Hierarchy::new(default_title, options);
    for line in lines {
        let line = line?;
        let line = line.as_ref();
        hierarchy.feed(line, patterns.classify(line), sink)?;
    }
    hierarchy.finish(sink)
}
