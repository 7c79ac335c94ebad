//! # Upload Reader
//!
//! Turns uploaded bytes into [`RawRow`]s keyed by schema column. Header
//! cells are mapped through [`crate::template::lookup`]; unknown columns are
//! ignored, duplicate or missing required columns reject the file.
//!
//! Row numbers are 1-based over the data records, header excluded, which is
//! what a spreadsheet user sees. Empty lines and rows whose cells are all
//! blank are skipped but still consume a number so later rows keep their
//! position. A cell that is not UTF-8 fails its own row, not the upload.

use csv::{ReaderBuilder, Trim};

use crate::error::IngestError;
use crate::template::{self, TEMPLATE_COLUMNS};

/// One non-blank data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based position in the upload, header excluded.
    pub row: usize,
    cells: Vec<(&'static str, String)>,
    undecodable: Option<&'static str>,
}

impl RawRow {
    pub fn new(row: usize, cells: Vec<(&'static str, String)>) -> Self {
        Self {
            row,
            cells,
            undecodable: None,
        }
    }

    /// First column whose bytes were not UTF-8; that cell is left out.
    pub fn undecodable(&self) -> Option<&'static str> {
        self.undecodable
    }

    /// The trimmed value of `column`, `None` when absent or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// A parsed upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub rows: Vec<RawRow>,
    /// All-blank rows that were skipped.
    pub blank_rows: usize,
    /// Header cells that matched no schema column.
    pub ignored_columns: Vec<String>,
}

pub fn read_upload(bytes: &[u8]) -> Result<Upload, IngestError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(IngestError::MissingHeader);
    }

    let mut mapping: Vec<Option<&'static str>> = Vec::with_capacity(headers.len());
    let mut ignored_columns = Vec::new();
    for header in headers.iter() {
        match template::lookup(header) {
            Some(column) => {
                if mapping.contains(&Some(column.name)) {
                    return Err(IngestError::DuplicateColumn {
                        column: column.name.to_string(),
                    });
                }
                mapping.push(Some(column.name));
            }
            None => {
                if !header.trim().is_empty() {
                    ignored_columns.push(header.to_string());
                }
                mapping.push(None);
            }
        }
    }

    let missing: Vec<String> = TEMPLATE_COLUMNS
        .iter()
        .filter(|c| c.required && !mapping.contains(&Some(c.name)))
        .map(|c| c.name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns { columns: missing });
    }
    if !ignored_columns.is_empty() {
        tracing::debug!(columns = ?ignored_columns, "ignoring unknown upload columns");
    }

    let numbers = row_numbers(bytes);
    let mut upload = Upload {
        ignored_columns,
        ..Upload::default()
    };
    let mut last_row = 0;
    for (index, record) in reader.byte_records().enumerate() {
        let record = record?;
        let row = numbers.get(index).copied().unwrap_or(last_row + 1);
        upload.blank_rows += row.saturating_sub(last_row + 1);
        last_row = row;
        if record.iter().all(<[u8]>::is_empty) {
            upload.blank_rows += 1;
            continue;
        }
        let mut raw = RawRow::new(row, Vec::with_capacity(mapping.len()));
        for (column, value) in mapping.iter().zip(record.iter()) {
            let Some(column) = *column else { continue };
            match std::str::from_utf8(value) {
                Ok(text) => raw.cells.push((column, text.to_string())),
                Err(_) => {
                    raw.undecodable.get_or_insert(column);
                }
            }
        }
        upload.rows.push(raw);
    }
    Ok(upload)
}

#[derive(Clone, Copy)]
enum Scan {
    FieldStart,
    Unquoted,
    Quoted,
    AfterQuote,
}

/// Data-row number of every non-empty record after the header, as the csv
/// reader yields them. Empty lines count; quoted cells may span lines.
fn row_numbers(bytes: &[u8]) -> Vec<usize> {
    let mut numbers = Vec::new();
    let mut header_seen = false;
    let mut ordinal = 0;
    let mut state = Scan::FieldStart;
    let mut empty = true;

    let mut end_record = |empty: bool| {
        if !header_seen {
            header_seen = !empty;
        } else {
            ordinal += 1;
            if !empty {
                numbers.push(ordinal);
            }
        }
    };

    let mut bytes = bytes.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        let quoted = matches!(state, Scan::Quoted);
        if !quoted && matches!(byte, b'\r' | b'\n') {
            if byte == b'\r' {
                bytes.next_if_eq(&b'\n');
            }
            end_record(empty);
            state = Scan::FieldStart;
            empty = true;
            continue;
        }
        state = match (state, byte) {
            (Scan::Quoted, b'"') => Scan::AfterQuote,
            (Scan::Quoted, _) => Scan::Quoted,
            (Scan::FieldStart | Scan::AfterQuote, b'"') => Scan::Quoted,
            (_, b',') => Scan::FieldStart,
            _ => Scan::Unquoted,
        };
        empty = false;
    }
    if !empty {
        end_record(false);
    }
    numbers
}
