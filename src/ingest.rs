//! Row ingestion and pre-write validation.
//!
//! Reads the whole source file up front, strips blank lines, detects
//! the delimiter, splits every data line into cells aligned to the
//! header specs, and enforces column-count and key-uniqueness
//! constraints before any database mutation happens. Row numbers in
//! diagnostics are 1-based positions in the filtered non-blank
//! sequence (the header counts as row 1 when it comes from the file).

use std::{collections::HashMap, fs, path::Path};

use csv::{ReaderBuilder, Trim};
use log::{debug, info, warn};

use crate::{
    error::{ImportError, ImportResult},
    header::{FieldSpec, parse_header},
};

/// One data line: trimmed cells aligned by index to the field specs.
#[derive(Debug, Clone)]
pub struct RawRow {
    /// 1-based position in the filtered non-blank line sequence.
    pub row_number: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn cell(&self, column: usize) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug)]
pub struct Source {
    pub field_specs: Vec<FieldSpec>,
    pub rows: Vec<RawRow>,
    pub delimiter: u8,
}

/// Read and validate the source file. `template_header` is the
/// template-supplied header definition; when present it always splits
/// on comma and the file's first non-blank line is the first data row.
pub fn read_source(path: &Path, template_header: Option<&str>) -> ImportResult<Source> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ImportError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Err(ImportError::EmptySource {
            path: path.to_path_buf(),
        });
    }

    let delimiter = detect_delimiter(lines[0]);
    debug!(
        "detected delimiter {:?} from first non-blank line",
        delimiter as char
    );

    let (header_tokens, data_start) = match template_header {
        // The template's own definition always uses comma.
        Some(header) => (split_line(header, b',')?, 0),
        None => (split_line(lines[0], delimiter)?, 1),
    };
    let field_specs = parse_header(&header_tokens);

    // The shape pass runs over every line before failing, so an
    // operator sees all short rows from one attempt.
    let mut rows = Vec::with_capacity(lines.len().saturating_sub(data_start));
    let mut first_malformed: Option<ImportError> = None;
    for (idx, line) in lines.iter().enumerate().skip(data_start) {
        let row_number = idx + 1;
        let mut cells = split_line(line, delimiter)?;
        if cells.len() < field_specs.len() {
            warn!(
                "row {row_number} is incomplete: expected {} cell(s), found {}",
                field_specs.len(),
                cells.len()
            );
            if first_malformed.is_none() {
                first_malformed = Some(ImportError::MalformedRow {
                    row: row_number,
                    expected: field_specs.len(),
                    found: cells.len(),
                    line: (*line).to_string(),
                });
            }
            continue;
        }
        // Extra trailing cells beyond the header count are ignored.
        cells.truncate(field_specs.len());
        rows.push(RawRow { row_number, cells });
    }
    if let Some(err) = first_malformed {
        return Err(err);
    }

    validate_keys(&field_specs, &rows)?;

    info!(
        "ingested {} data row(s) across {} column(s)",
        rows.len(),
        field_specs.len()
    );
    Ok(Source {
        field_specs,
        rows,
        delimiter,
    })
}

/// Prefer `;`, then tab, then default to comma.
pub fn detect_delimiter(line: &str) -> u8 {
    if line.contains(';') {
        b';'
    } else if line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Split one line preserving empty fields, with no quote handling (the
/// wire format is a naive split) and whitespace trimmed per cell.
fn split_line(line: &str, delimiter: u8) -> ImportResult<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    if reader.read_record(&mut record)? {
        Ok(record.iter().map(str::to_string).collect())
    } else {
        Ok(Vec::new())
    }
}

/// Intra-file uniqueness for key-flagged columns. The pass runs to
/// completion, logging every conflict it finds, then fails with the
/// first one.
fn validate_keys(field_specs: &[FieldSpec], rows: &[RawRow]) -> ImportResult<()> {
    let mut first_error: Option<ImportError> = None;
    for (col, spec) in field_specs.iter().enumerate() {
        if !spec.is_key {
            continue;
        }
        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        for row in rows {
            let value = row.cell(col);
            match first_seen.get(value) {
                Some(&first_row) => {
                    warn!(
                        "duplicate key '{}' in column '{}': row {} repeats row {}",
                        value, spec.original, row.row_number, first_row
                    );
                    if first_error.is_none() {
                        first_error = Some(ImportError::DuplicateKey {
                            token: spec.original.clone(),
                            value: value.to_string(),
                            first_row,
                            row: row.row_number,
                        });
                    }
                }
                None => {
                    first_seen.insert(value, row.row_number);
                }
            }
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
