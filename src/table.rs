//! CSV parsing of uploaded files into a column-named table.

use crate::error::PipelineError;
use csv::ReaderBuilder;
use std::path::Path;

/// Parsed tabular data: named columns, ordered rows, all cells kept as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the first column with this name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }
}

/// Read and parse a stored upload.
pub fn parse_csv_file(path: &Path) -> Result<ParsedTable, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| PipelineError::Parse(e.to_string()))?;
    parse_csv_bytes(&bytes)
}

/// Parse comma-separated bytes with a header row.
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<ParsedTable, PipelineError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    // csv treats EOF inside quotes as the end of the field
    if let Some(line) = unterminated_quote_line(bytes) {
        return Err(PipelineError::Parse(format!(
            "Error tokenizing data. EOF inside string starting at row {line}"
        )));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Parse(e.to_string()))?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PipelineError::Parse(
            "No columns to parse from file".to_string(),
        ));
    }

    // Header cells are trimmed so " amount" still matches the `amount` feature
    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::Parse(e.to_string()))?;

        if record.len() > columns.len() {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(rows.len() as u64 + 2);
            return Err(PipelineError::Parse(format!(
                "Error tokenizing data. Expected {} fields in line {line}, saw {}",
                columns.len(),
                record.len()
            )));
        }

        // Short rows are padded; empty cells read as missing values downstream
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        cells.resize(columns.len(), String::new());
        rows.push(cells);
    }

    Ok(ParsedTable::new(columns, rows))
}

/// One-based line where a quoted field opens without ever closing.
///
/// Only a quote at the start of a field opens a quoted section; a quote
/// later in an unquoted field is literal text. Inside a section `""` is an
/// escaped quote.
fn unterminated_quote_line(bytes: &[u8]) -> Option<usize> {
    let mut line = 1;
    let mut open_at = None;
    let mut field_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match open_at {
            Some(_) => match b {
                b'"' if bytes.get(i + 1) == Some(&b'"') => i += 1,
                b'"' => open_at = None,
                b'\n' => line += 1,
                _ => {}
            },
            None => match b {
                b'"' if field_start => {
                    open_at = Some(line);
                    field_start = false;
                }
                b'\n' => {
                    line += 1;
                    field_start = true;
                }
                b',' | b'\r' => field_start = true,
                _ => field_start = false,
            },
        }
        i += 1;
    }

    open_at
}
