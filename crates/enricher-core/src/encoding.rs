//! Tolerant text decoding for input tables.
//!
//! Spreadsheets exported on different machines arrive in a handful of
//! encodings. Decoders are tried in a fixed order; the first that accepts the
//! whole byte buffer wins.

use std::borrow::Cow;
use std::fmt;

/// Supported input encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// UTF-8 with an optional leading byte-order mark
    Utf8Sig,
    /// ISO-8859-1: every byte maps to the code point of the same value
    Latin1,
    /// Windows-1252 as browsers decode it; the five unassigned bytes become
    /// C1 controls
    Cp1252,
}

/// Default fallback order
pub const DEFAULT_ENCODINGS: &[TextEncoding] = &[
    TextEncoding::Utf8,
    TextEncoding::Utf8Sig,
    TextEncoding::Latin1,
    TextEncoding::Cp1252,
];

const BOM: &[u8] = b"\xEF\xBB\xBF";

impl TextEncoding {
    /// Parse a config label (case-insensitive, `_` and `-` interchangeable)
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "utf-8-sig" | "utf8-sig" => Some(Self::Utf8Sig),
            "iso-8859-1" | "latin-1" | "latin1" => Some(Self::Latin1),
            "cp1252" | "windows-1252" => Some(Self::Cp1252),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Latin1 => "iso-8859-1",
            Self::Cp1252 => "cp1252",
        }
    }

    /// Decode the whole buffer, `None` if any byte sequence is invalid
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Self::Utf8Sig => {
                let body = bytes.strip_prefix(BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            Self::Cp1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Try each encoding in order. Returns the decoded text (leading BOM removed)
/// and the encoding that accepted it.
pub fn decode_with_fallback(
    bytes: &[u8],
    encodings: &[TextEncoding],
) -> Option<(String, TextEncoding)> {
    encodings.iter().find_map(|&enc| {
        enc.decode(bytes).map(|text| {
            let text = match text.strip_prefix('\u{FEFF}') {
                Some(rest) => rest.to_string(),
                None => text,
            };
            (text, enc)
        })
    })
}
