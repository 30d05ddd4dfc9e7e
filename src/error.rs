//! Structured error taxonomy for the import engine.
//!
//! Every row-scoped variant carries the 1-based file row number, the
//! 1-based column position, and the original header token so an operator
//! can locate the offending cell without re-deriving parser internals.
//! All errors are fatal to the run; nothing is caught and retried
//! internally.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::ColumnKind;

pub type ImportResult<T> = Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Missing/invalid template reference, unresolved table for a tab,
    /// or an identifier unusable in dynamic SQL.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("source file not found: {path:?}")]
    SourceNotFound { path: PathBuf },

    #[error("source file {path:?} contains no non-blank lines")]
    EmptySource { path: PathBuf },

    #[error(
        "row {row} is incomplete: expected {expected} cell(s), found {found} -> line: {line}"
    )]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
        line: String,
    },

    #[error(
        "duplicate key value '{value}' in column '{token}': row {row} repeats row {first_row}"
    )]
    DuplicateKey {
        token: String,
        value: String,
        first_row: usize,
        row: usize,
    },

    #[error(
        "row {row}, column {column} ({token}): no row in {table} matches {lookup_column}='{value}'"
    )]
    LookupNotFound {
        row: usize,
        column: usize,
        token: String,
        table: String,
        lookup_column: String,
        value: String,
    },

    #[error(
        "row {row}, column {column} ({token}): ambiguous lookup, {matches} rows in {table} match {lookup_column}='{value}'"
    )]
    LookupAmbiguous {
        row: usize,
        column: usize,
        token: String,
        table: String,
        lookup_column: String,
        value: String,
        matches: usize,
    },

    #[error("row {row}, column {column} ({token}): cannot cast '{value}' to {kind}: {reason}")]
    TypeCast {
        row: usize,
        column: usize,
        token: String,
        value: String,
        kind: ColumnKind,
        reason: String,
    },

    /// A targeted UPDATE matched zero rows.
    #[error("row {row}: update matched no record for {predicate}")]
    RecordNotFound { row: usize, predicate: String },

    #[error("no sequence entry found for table {table}")]
    SequenceExhausted { table: String },

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
