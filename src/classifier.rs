//! Line classification against chapter and sub-chapter patterns.

use lazy_static::lazy_static;
use regex::bytes::Regex;

use crate::error::Result;
use crate::types::LineKind;

/// Default pattern for chapter headings such as `第十二章 回家`.
pub const DEFAULT_CHAPTER_PATTERN: &str = r"^第[零一二三四五六七八九十百千两\d]+章[　 ]{0,1}.*$";

lazy_static! {
    /// Compiled form of [`DEFAULT_CHAPTER_PATTERN`].
    pub static ref DEFAULT_CHAPTER_REGEX: Regex = Regex::new(DEFAULT_CHAPTER_PATTERN).unwrap();
}

/// Something that can decide whether a decoded line matches a heading pattern.
pub trait LineMatcher {
    fn matches(&self, line: &[u8]) -> bool;
}

impl LineMatcher for Regex {
    fn matches(&self, line: &[u8]) -> bool {
        self.is_match(line)
    }
}

impl LineMatcher for regex::Regex {
    /// Lines that are not valid UTF-8 never match a string regex.
    fn matches(&self, line: &[u8]) -> bool {
        std::str::from_utf8(line).is_ok_and(|line| self.is_match(line))
    }
}

impl<F> LineMatcher for F
where
    F: Fn(&[u8]) -> bool,
{
    fn matches(&self, line: &[u8]) -> bool {
        self(line)
    }
}

/// Classifies one line.
///
/// The chapter matcher always wins; the sub-chapter matcher is only consulted
/// when it is configured and the chapter matcher did not match.
pub fn classify(
    line: &[u8],
    chapter: &dyn LineMatcher,
    sub_chapter: Option<&dyn LineMatcher>,
) -> LineKind {
    if chapter.matches(line) {
        LineKind::Chapter
    } else if sub_chapter.is_some_and(|sub_chapter| sub_chapter.matches(line)) {
        LineKind::SubChapter
    } else {
        LineKind::Content
    }
}

/// Compiled chapter and optional sub-chapter patterns.
#[derive(Debug, Clone)]
pub struct Patterns {
    chapter: Regex,
    sub_chapter: Option<Regex>,
}

impl Patterns {
    /// Compiles both patterns. An empty sub-chapter pattern means none.
    pub fn compile(chapter: &str, sub_chapter: Option<&str>) -> Result<Self> {
        let chapter = Regex::new(chapter)?;
        let sub_chapter = match sub_chapter {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern)?),
            _ => None,
        };
        Ok(Self {
            chapter,
            sub_chapter,
        })
    }

    /// Bundles already compiled patterns.
    ///
    /// # Arguments
    ///
    /// * `chapter` - Recognizes chapter headings
    /// * `sub_chapter` - Recognizes sub-chapter headings, `None` to disable them
    pub fn new(chapter: Regex, sub_chapter: Option<Regex>) -> Self {
        Self {
            chapter,
            sub_chapter,
        }
    }

    /// The chapter heading pattern.
    pub fn chapter(&self) -> &Regex {
        &self.chapter
    }

    /// The sub-chapter heading pattern, if configured.
    pub fn sub_chapter(&self) -> Option<&Regex> {
        self.sub_chapter.as_ref()
    }

    /// Classifies one decoded line, see [`classify`].
    ///
    /// # Returns
    ///
    /// [`LineKind::Chapter`] if the chapter pattern matches,
    /// [`LineKind::SubChapter`] if only the sub-chapter pattern matches,
    /// [`LineKind::Content`] otherwise.
    pub fn classify(&self, line: &[u8]) -> LineKind {
        classify(
            line,
            &self.chapter,
            self.sub_chapter.as_ref().map(|re| re as &dyn LineMatcher),
        )
    }
}

impl Default for Patterns {
    fn default() -> Self {
        Self::new(DEFAULT_CHAPTER_REGEX.clone(), None)
    }
}
