//! Tabular file parsing with encoding, delimiter and sheet auto-detection.
//!
//! [`detect_format`] inspects a file and decides how to read it;
//! [`parse_rows`] then materializes the header and raw data rows. Cells stay
//! untyped text here, typing happens in [`crate::transform::normalize`].

pub mod detect;
pub mod spreadsheet;

use serde::Serialize;
use std::fmt;
use std::path::Path;

pub use detect::{detect_text_format, format_delimiter, ColumnSpan, Layout, TextEncoding, TextFormat};
pub use spreadsheet::{select_sheet, SheetReader, SheetSelection};

use crate::error::{IngestError, IngestResult, ParseError};

/// Header row plus raw data rows, every row as wide as the header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

// =============================================================================
// Input kinds
// =============================================================================

/// Kind of input, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Spreadsheet,
}

impl InputKind {
    pub fn from_path(path: &Path) -> IngestResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "tsv" | "txt" | "dat" => Ok(InputKind::Text),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputKind::Spreadsheet),
            other => Err(IngestError::format(format!(
                "Unsupported file format: .{}",
                other
            ))),
        }
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Outcome of format detection, holding what the row parser needs.
#[derive(Debug, Clone)]
pub enum DetectedFormat {
    Text { bytes: Vec<u8>, format: TextFormat },
    Sheet(SheetSelection),
}

impl DetectedFormat {
    /// Short description for status messages.
    pub fn describe(&self) -> String {
        match self {
            DetectedFormat::Text { format, .. } => {
                format!("{} encoding and {}", format.encoding, format.layout)
            }
            DetectedFormat::Sheet(selection) => {
                format!("sheet '{}' ({} reader)", selection.sheet, selection.reader)
            }
        }
    }
}

/// Detect how to read `path`.
pub fn detect_format(path: &Path) -> IngestResult<DetectedFormat> {
    match InputKind::from_path(path)? {
        InputKind::Text => {
            let bytes = std::fs::read(path).map_err(|e| {
                IngestError::format(format!("Cannot read file '{}': {}", path.display(), e))
            })?;
            let format = detect_text_format(&bytes)?;
            Ok(DetectedFormat::Text { bytes, format })
        }
        InputKind::Spreadsheet => Ok(DetectedFormat::Sheet(select_sheet(path)?)),
    }
}

// =============================================================================
// Row parsing
// =============================================================================

/// Read the whole input under the detected format.
///
/// Failures here are [`IngestError::Parse`] and are not retried with other
/// formats.
pub fn parse_rows(detected: &DetectedFormat) -> IngestResult<RawTable> {
    match detected {
        DetectedFormat::Text { bytes, format } => Ok(read_text_table(bytes, format)?),
        DetectedFormat::Sheet(selection) => Ok(spreadsheet::range_to_table(&selection.range)),
    }
}

/// Decode and split a text file.
pub fn read_text_table(bytes: &[u8], format: &TextFormat) -> Result<RawTable, ParseError> {
    let content = format.encoding.decode(bytes).ok_or_else(|| {
        let message = format!("File is not valid {}", format.encoding);
        match format.encoding.first_invalid_line(bytes) {
            Some(line) => ParseError::at_line(line, message),
            None => ParseError::new(message),
        }
    })?;

    match &format.layout {
        Layout::Delimited(delimiter) => read_delimited(&content, *delimiter as u8),
        Layout::FixedWidth(spans) => Ok(read_fixed_width(&content, spans)),
    }
}

/// Parse delimited text. Short rows are padded, wide rows are an error.
pub fn read_delimited(content: &str, delimiter: u8) -> Result<RawTable, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(str::to_string).collect(),
        None => return Err(ParseError::new("No header row found")),
    };
    let width = headers.len();

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(ParseError::at_line(
                line,
                format!("Expected {} fields, saw {}", width, record.len()),
            ));
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

/// Slice each non-blank line by character spans; the first line is the header.
pub fn read_fixed_width(content: &str, spans: &[ColumnSpan]) -> RawTable {
    let mut lines = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let chars: Vec<char> = line.chars().collect();
            spans
                .iter()
                .map(|span| {
                    let end = span.end.min(chars.len());
                    let start = span.start.min(end);
                    chars[start..end].iter().collect::<String>().trim().to_string()
                })
                .collect::<Vec<_>>()
        });

    let headers = lines.next().unwrap_or_default();
    RawTable { headers, rows: lines.collect() }
}

// =============================================================================
// Naive comma split (upload fallback)
// =============================================================================

/// Comma-only split of trimmed content into lines of trimmed cells.
///
/// No quoting rules apply. Used by the upload fallback, which deliberately
/// skips detection and typing.
pub fn split_comma_lines(content: &str) -> Vec<Vec<String>> {
    content
        .trim()
        .split('\n')
        .map(|line| line.split(',').map(|cell| cell.trim().to_string()).collect())
        .collect()
}

impl fmt::Display for RawTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows x {} columns", self.rows.len(), self.headers.len())
    }
}
