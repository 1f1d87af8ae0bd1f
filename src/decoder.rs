//! Source decoding: raw manuscript bytes to canonical UTF-8 lines.
//!
//! Lines are split on `\n` (a trailing `\r` is dropped) before decoding, so
//! every decode failure can be pinned to a 1-based line number. Decoding never
//! substitutes replacement characters: a malformed line is an error and ends
//! the conversion.

use std::borrow::Cow;

use bstr::ByteSlice;

use crate::error::{Error, Result};
use crate::types::TextEncoding;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decodes lines of a manuscript written in a given [`TextEncoding`].
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    encoding: TextEncoding,
}

impl Decoder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decodes a single line. `line_number` is only used for error reporting.
    ///
    /// UTF-8 input is validated and borrowed; other encodings are transcoded.
    pub fn decode_line<'a>(&self, raw: &'a [u8], line_number: usize) -> Result<Cow<'a, [u8]>> {
        let decoded = if self.encoding == TextEncoding::Utf8 {
            std::str::from_utf8(raw).ok().map(|_| Cow::Borrowed(raw))
        } else {
            self.encoding
                .codec()
                .decode_without_bom_handling_and_without_replacement(raw)
                .map(|text| match text {
                    Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
                    Cow::Owned(text) => Cow::Owned(text.into_bytes()),
                })
        };

        decoded.ok_or_else(|| Error::Decode {
            line: line_number,
            encoding: self.encoding.label().to_string(),
        })
    }

    /// Splits `raw` into lines and lazily decodes each of them.
    ///
    /// A UTF-8 byte order mark at the start of UTF-8 input is skipped. A final
    /// line without terminator is included; no empty line is produced after a
    /// trailing newline.
    pub fn lines<'a>(&self, raw: &'a [u8]) -> impl Iterator<Item = Result<Cow<'a, [u8]>>> + 'a {
        let decoder = *self;
        let raw = match self.encoding {
            TextEncoding::Utf8 => raw.strip_prefix(UTF8_BOM).unwrap_or(raw),
            _ => raw,
        };
        raw.lines()
            .enumerate()
            .map(move |(index, line)| decoder.decode_line(line, index + 1))
    }
}
