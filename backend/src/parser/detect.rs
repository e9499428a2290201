//! Encoding, delimiter and fixed-width detection for delimited text files.
//!
//! Candidates are tried in a fixed order so detection is deterministic:
//! the first encoding that decodes the leading sample wins, and among the
//! delimiters that parse the sample the widest header wins (earliest on ties).

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

use crate::error::{IngestError, IngestResult};

/// Bytes decoded to pick encoding and delimiter.
pub const SAMPLE_BYTES: usize = 64 * 1024;

/// Data rows parsed per delimiter candidate.
pub const SAMPLE_ROWS: usize = 5;

/// Lines scanned to infer a fixed-width layout.
pub const FIXED_WIDTH_SCAN_LINES: usize = 100;

/// Delimiter candidates, in tie-break order.
pub const DELIMITERS: [u8; 6] = [b',', b';', b'\t', b'|', b':', b' '];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// =============================================================================
// Encodings
// =============================================================================

/// Candidate text encodings, in trial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-8-sig")]
    Utf8Sig,
    #[serde(rename = "latin-1")]
    Latin1,
    #[serde(rename = "cp1252")]
    Windows1252,
    #[serde(rename = "iso-8859-1")]
    Iso88591,
}

impl TextEncoding {
    pub const CANDIDATES: [TextEncoding; 5] = [
        TextEncoding::Utf8,
        TextEncoding::Utf8Sig,
        TextEncoding::Latin1,
        TextEncoding::Windows1252,
        TextEncoding::Iso88591,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "cp1252",
            TextEncoding::Iso88591 => "iso-8859-1",
        }
    }

    /// Decode without replacement. `None` if any byte sequence is invalid.
    ///
    /// Plain UTF-8 declines input that starts with a byte-order mark, which
    /// leaves those files to the BOM-aware candidate.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                UTF_8.decode_without_bom_handling_and_without_replacement(bytes)
            }
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8.decode_without_bom_handling_and_without_replacement(body)
            }
            TextEncoding::Latin1 | TextEncoding::Iso88591 => {
                Some(encoding_rs::mem::decode_latin1(bytes))
            }
            TextEncoding::Windows1252 => {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }

    /// Decode a leading sample that may have been cut inside a multi-byte
    /// sequence or a line. The trailing partial line is dropped.
    pub fn decode_sample(&self, bytes: &[u8], truncated: bool) -> Option<String> {
        let decoded = if truncated {
            // A UTF-8 sequence is at most 4 bytes, so at most 3 can dangle.
            (0..=3.min(bytes.len()))
                .find_map(|cut| self.decode(&bytes[..bytes.len() - cut]))?
        } else {
            self.decode(bytes)?
        };
        if !truncated {
            return Some(decoded.into_owned());
        }
        match decoded.rfind('\n') {
            Some(pos) => Some(decoded[..=pos].to_string()),
            None => Some(decoded.into_owned()),
        }
    }

    /// 1-based line of the first byte that fails to decode, for error messages.
    pub fn first_invalid_line(&self, bytes: &[u8]) -> Option<u64> {
        match self {
            TextEncoding::Utf8 | TextEncoding::Utf8Sig => {
                let valid = Encoding::utf8_valid_up_to(bytes);
                if valid == bytes.len() {
                    None
                } else {
                    Some(bytes[..valid].iter().filter(|&&b| b == b'\n').count() as u64 + 1)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Half-open range of character positions forming one fixed-width column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpan {
    pub start: usize,
    pub end: usize,
}

/// How fields are separated in a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Delimited(char),
    FixedWidth(Vec<ColumnSpan>),
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Delimited(d) => write!(f, "'{}' delimiter", format_delimiter(*d)),
            Layout::FixedWidth(spans) => write!(f, "fixed-width layout ({} columns)", spans.len()),
        }
    }
}

/// Format a delimiter for display.
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        ' ' => "space".to_string(),
        c => c.to_string(),
    }
}

/// Detected format of a text file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextFormat {
    pub encoding: TextEncoding,
    pub layout: Layout,
}

// =============================================================================
// Detection
// =============================================================================

/// Detect encoding and layout from the raw bytes of a text file.
pub fn detect_text_format(bytes: &[u8]) -> IngestResult<TextFormat> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(IngestError::format("File is empty"));
    }

    let truncated = bytes.len() > SAMPLE_BYTES;
    let head = &bytes[..bytes.len().min(SAMPLE_BYTES)];

    for encoding in TextEncoding::CANDIDATES {
        let Some(sample) = encoding.decode_sample(head, truncated) else {
            tracing::debug!(encoding = %encoding, "sample does not decode");
            continue;
        };

        let Some((delimiter, columns)) = best_delimiter(&sample) else {
            tracing::debug!(encoding = %encoding, "no delimiter parses the sample");
            continue;
        };

        tracing::debug!(encoding = %encoding, delimiter = %format_delimiter(delimiter as char), columns, "delimiter selected");

        let layout = if columns == 1 {
            let spans = infer_fixed_width(&sample);
            if spans.len() > 1 {
                Layout::FixedWidth(spans)
            } else {
                Layout::Delimited(delimiter as char)
            }
        } else {
            Layout::Delimited(delimiter as char)
        };

        return Ok(TextFormat { encoding, layout });
    }

    Err(IngestError::format(
        "Could not parse file with any supported encoding or delimiter",
    ))
}

/// Pick the delimiter producing the most header columns. Ties keep the
/// earliest candidate.
pub fn best_delimiter(sample: &str) -> Option<(u8, usize)> {
    let mut best: Option<(u8, usize)> = None;
    for &delimiter in &DELIMITERS {
        if let Some(columns) = count_columns(sample, delimiter) {
            if best.map_or(true, |(_, max)| columns > max) {
                best = Some((delimiter, columns));
            }
        }
    }
    best
}

/// Header width when the header plus the first [`SAMPLE_ROWS`] rows parse
/// with `delimiter`. A row wider than the header rejects the delimiter.
pub fn count_columns(sample: &str, delimiter: u8) -> Option<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(sample.as_bytes());

    let mut records = reader.records();
    let header = records.next()?.ok()?;
    let width = header.len();

    for record in records.take(SAMPLE_ROWS) {
        if record.ok()?.len() > width {
            return None;
        }
    }

    Some(width)
}

/// Column spans are maximal runs of character positions that hold a
/// non-blank character in at least one of the scanned lines.
pub fn infer_fixed_width(sample: &str) -> Vec<ColumnSpan> {
    let mut occupied: Vec<bool> = Vec::new();

    for line in sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(FIXED_WIDTH_SCAN_LINES)
    {
        for (pos, ch) in line.chars().enumerate() {
            if pos >= occupied.len() {
                occupied.resize(pos + 1, false);
            }
            if !ch.is_whitespace() {
                occupied[pos] = true;
            }
        }
    }

    let mut spans = Vec::new();
    let mut start = None;
    for (pos, &used) in occupied.iter().enumerate() {
        match (used, start) {
            (true, None) => start = Some(pos),
            (false, Some(s)) => {
                spans.push(ColumnSpan { start: s, end: pos });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push(ColumnSpan { start: s, end: occupied.len() });
    }
    spans
}
