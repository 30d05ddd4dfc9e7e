//! Runtime schema catalog.
//!
//! The import engine learns the destination schema only at runtime. This
//! module maps whatever the live catalog declares into a small closed
//! set of semantic column kinds so the value resolver never switches
//! over store-specific type codes. Table metadata is introspected via
//! `PRAGMA table_info` and cached per table for the lifetime of the run.

use std::{cell::RefCell, collections::HashMap, fmt};

use log::debug;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{ImportError, ImportResult};

/// Closed set of semantic column kinds. Everything the resolver casts
/// against lives here; catalog-specific declared types never leak past
/// this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnKind {
    Integer,
    Decimal,
    Text,
    Boolean,
    Temporal,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Decimal)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Temporal => "temporal",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Metadata adapter over the live connection with a per-table cache.
pub struct Catalog<'c> {
    conn: &'c Connection,
    tables: RefCell<HashMap<String, TableInfo>>,
}

impl<'c> Catalog<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Catalog {
            conn,
            tables: RefCell::new(HashMap::new()),
        }
    }

    /// Template -> tab -> table, via the catalog tables.
    pub fn resolve_table_name(&self, tab_id: i64) -> ImportResult<String> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT t.table_name FROM ad_tab tab \
                 JOIN ad_table t ON t.ad_table_id = tab.ad_table_id \
                 WHERE tab.ad_tab_id = ?1",
                [tab_id],
                |row| row.get(0),
            )
            .optional()?;
        name.ok_or_else(|| {
            ImportError::Configuration(format!("no table found for tab {tab_id}"))
        })
    }

    pub fn column_kind(&self, table: &str, column: &str) -> ImportResult<ColumnKind> {
        Ok(self
            .with_table(table, |info| info.column(column).map(|c| c.kind))?
            .unwrap_or(ColumnKind::Text))
    }

    pub fn max_length(&self, table: &str, column: &str) -> ImportResult<Option<usize>> {
        Ok(self
            .with_table(table, |info| {
                info.column(column).and_then(|c| c.max_length)
            })?)
    }

    pub fn has_column(&self, table: &str, column: &str) -> ImportResult<bool> {
        Ok(self.with_table(table, |info| info.column(column).is_some())?)
    }

    pub fn columns(&self, table: &str) -> ImportResult<Vec<ColumnInfo>> {
        self.with_table(table, |info| info.columns.clone())
    }

    /// Draw the next primary-key value from the table-scoped sequence.
    /// A missing sequence row is a hard error; the caller must have
    /// seeded `ad_sequence` for every table it inserts into.
    pub fn next_primary_key(&self, table: &str) -> ImportResult<i64> {
        let next: Option<i64> = self
            .conn
            .query_row(
                "SELECT current_next FROM ad_sequence WHERE name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        let next = next.ok_or_else(|| ImportError::SequenceExhausted {
            table: table.to_string(),
        })?;
        self.conn.execute(
            "UPDATE ad_sequence SET current_next = current_next + 1 WHERE name = ?1",
            [table],
        )?;
        Ok(next)
    }

    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&TableInfo) -> T,
    ) -> ImportResult<T> {
        let key = table.to_ascii_lowercase();
        if let Some(info) = self.tables.borrow().get(&key) {
            return Ok(f(info));
        }
        let info = self.introspect(table)?;
        let result = f(&info);
        self.tables.borrow_mut().insert(key, info);
        Ok(result)
    }

    fn introspect(&self, table: &str) -> ImportResult<TableInfo> {
        ensure_identifier(table)?;
        let sql = format!("PRAGMA table_info({table})");
        let mut stmt = self.conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get("name")?;
                let decl: Option<String> = row.get("type")?;
                Ok((name, decl.unwrap_or_default()))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(name, decl)| {
                let kind = kind_from_declaration(&decl, &name);
                let max_length = if kind == ColumnKind::Text {
                    declared_length(&decl)
                } else {
                    None
                };
                ColumnInfo {
                    name,
                    kind,
                    max_length,
                }
            })
            .collect::<Vec<_>>();
        debug!("introspected {table}: {} column(s)", columns.len());
        Ok(TableInfo { columns })
    }
}

/// Map a declared SQL type into the closed kind set. Surrogate-key
/// naming (`*_ID`) wins over the declaration, matching the catalog's
/// reference-type taxonomy.
fn kind_from_declaration(decl: &str, column_name: &str) -> ColumnKind {
    let upper = decl.to_ascii_uppercase();
    if column_name.to_ascii_uppercase().ends_with("_ID") {
        return ColumnKind::Integer;
    }
    if upper.contains("BOOL") {
        return ColumnKind::Boolean;
    }
    if upper.contains("INT") {
        return ColumnKind::Integer;
    }
    if ["DEC", "NUMERIC", "REAL", "FLOA", "DOUB", "MONEY", "NUMBER"]
        .iter()
        .any(|t| upper.contains(t))
    {
        return ColumnKind::Decimal;
    }
    if upper.contains("DATE") || upper.contains("TIME") {
        return ColumnKind::Temporal;
    }
    // ERP yes/no flags are CHAR(1) columns named Is*.
    if column_name.len() > 2
        && column_name.to_ascii_lowercase().starts_with("is")
        && upper.contains("CHAR(1)")
    {
        return ColumnKind::Boolean;
    }
    ColumnKind::Text
}

/// Parenthesized length from declarations like `VARCHAR(60)`.
fn declared_length(decl: &str) -> Option<usize> {
    let open = decl.find('(')?;
    let rest = &decl[open + 1..];
    let end = rest.find([')', ','])?;
    rest[..end].trim().parse().ok()
}

/// Names interpolated into dynamic SQL must be plain identifiers; raw
/// cell values always travel as bind parameters.
pub fn ensure_identifier(name: &str) -> ImportResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ImportError::Configuration(format!(
            "invalid identifier '{name}'"
        )))
    }
}
