//! Titled sections and the content-formatting policy.
//!
//! A [`Section`] is a title plus an append-only buffer of formatted XHTML
//! fragments. A [`Chapter`] is a top-level section owning its sub-chapters in
//! creation order. Content always goes to the innermost open section: the
//! chapter itself until its first sub-chapter opens, the latest sub-chapter
//! afterwards.

use std::borrow::Cow;

use bstr::ByteSlice;

use crate::types::FormatOptions;

/// Line-break marker appended for blank lines and, outside paragraph mode,
/// before every line.
pub const LINE_FEED: &[u8] = b"<br/>";
/// Paragraph opening tag used in paragraph mode.
pub const PARAGRAPH_START: &[u8] = b"<p>";
/// Paragraph closing tag used in paragraph mode.
pub const PARAGRAPH_END: &[u8] = b"</p>";

/// Lines of at most this many bytes (after escaping) are treated as blank.
///
/// A single multi-byte character is longer than this, but a single ASCII
/// character is not, so a one-letter line renders as a line break.
pub const TRIVIAL_LINE_MAX_LEN: usize = 1;

/// HTML-escapes a line. Valid UTF-8 runs are escaped, invalid byte runs are
/// copied through untouched.
///
/// `&`, `<` and `>` become named entities, quotes the numeric `&#34;` and
/// `&#39;`.
pub fn escape_line(line: &[u8]) -> Cow<'_, [u8]> {
    if !line
        .iter()
        .any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\''))
    {
        return Cow::Borrowed(line);
    }

    let mut escaped = Vec::with_capacity(line.len() + 16);
    for chunk in line.utf8_chunks() {
        escape_text(chunk.valid(), &mut escaped);
        escaped.extend_from_slice(chunk.invalid());
    }
    Cow::Owned(escaped)
}

fn escape_text(text: &str, out: &mut Vec<u8>) {
    let mut rest = text;
    while let Some(pos) = rest.find(['"', '\'']) {
        out.extend_from_slice(html_escape::encode_text(&rest[..pos]).as_bytes());
        out.extend_from_slice(match rest.as_bytes()[pos] {
            b'"' => b"&#34;",
            _ => b"&#39;",
        });
        rest = &rest[pos + 1..];
    }
    out.extend_from_slice(html_escape::encode_text(rest).as_bytes());
}

/// A titled, append-only buffer of formatted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    title: String,
    content: Vec<u8>,
}

impl Section {
    /// Creates an empty section.
    ///
    /// # Arguments
    ///
    /// * `title` - Heading shown in the page and the table of contents
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: Vec::new(),
        }
    }

    /// Creates a section titled after the raw text of its triggering line.
    pub fn from_line(line: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(line))
    }

    /// The section heading, taken verbatim from its triggering line.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The formatted body accumulated so far.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// True when nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consumes the section, returning its title and content.
    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.title, self.content)
    }

    /// Appends the formatted representation of `line`.
    ///
    /// # Arguments
    ///
    /// * `line` - One decoded line without its terminator
    /// * `options` - Escaping and paragraph policy of the run
    ///
    /// Appending is not idempotent: the same line appended twice shows up
    /// twice.
    pub fn append(&mut self, line: &[u8], options: &FormatOptions) {
        let line = if options.escape {
            escape_line(line)
        } else {
            Cow::Borrowed(line)
        };
        let trivial = line.len() <= TRIVIAL_LINE_MAX_LEN;

        if options.paragraph_mode {
            if trivial {
                self.content.extend_from_slice(LINE_FEED);
            } else {
                self.content.reserve(PARAGRAPH_START.len() + line.len() + PARAGRAPH_END.len());
                self.content.extend_from_slice(PARAGRAPH_START);
                self.content.extend_from_slice(&line);
                self.content.extend_from_slice(PARAGRAPH_END);
            }
        } else {
            self.content.extend_from_slice(LINE_FEED);
            if !trivial {
                self.content.extend_from_slice(&line);
            }
        }
    }
}

/// A top-level section with its sub-chapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    section: Section,
    sub_chapters: Vec<Section>,
}

impl Chapter {
    /// Creates an empty chapter without sub-chapters.
    ///
    /// # Arguments
    ///
    /// * `title` - Heading shown in the page and the table of contents
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            section: Section::new(title),
            sub_chapters: Vec::new(),
        }
    }

    /// Creates a chapter titled after the raw text of its triggering line.
    pub fn from_line(line: &[u8]) -> Self {
        Self {
            section: Section::from_line(line),
            sub_chapters: Vec::new(),
        }
    }

    /// The chapter heading.
    pub fn title(&self) -> &str {
        self.section.title()
    }

    /// Content written before the first sub-chapter opened.
    pub fn content(&self) -> &[u8] {
        self.section.content()
    }

    /// The chapter's own section (title and direct content).
    pub fn section(&self) -> &Section {
        &self.section
    }

    /// Sub-chapters in the order they were opened. Only the last one is open.
    pub fn sub_chapters(&self) -> &[Section] {
        &self.sub_chapters
    }

    /// True when neither the chapter nor any sub-chapter holds content and no
    /// sub-chapter was opened.
    pub fn is_empty(&self) -> bool {
        self.section.is_empty() && self.sub_chapters.is_empty()
    }

    /// Opens a new sub-chapter. From now on it receives all content; the
    /// previously open sub-chapter stays attached but is closed.
    pub fn add_sub_chapter(&mut self, sub_chapter: Section) {
        self.sub_chapters.push(sub_chapter);
    }

    /// The section currently receiving content.
    ///
    /// Once a sub-chapter exists, the chapter's own buffer is sealed.
    pub fn innermost_mut(&mut self) -> &mut Section {
        match self.sub_chapters.last_mut() {
            Some(sub_chapter) => sub_chapter,
            None => &mut self.section,
        }
    }

    /// Appends a content line to the innermost open section.
    pub fn append(&mut self, line: &[u8], options: &FormatOptions) {
        self.innermost_mut().append(line, options);
    }

    /// Consumes the chapter, returning its own section and its sub-chapters.
    pub fn into_parts(self) -> (Section, Vec<Section>) {
        (self.section, self.sub_chapters)
    }
}
