//! Per-cell value resolution.
//!
//! For each (field spec, raw cell) pair the resolver decides whether
//! the value is null, a literal numeric id, the result of a lookup
//! against a related table, or a plain cast against the destination
//! column's declared kind. Resolution order is fixed:
//!
//! 1. empty cell / `(null)` token -> null, short-circuiting everything;
//! 2. numeric destination + all-digit cell -> direct numeric parse,
//!    bypassing any configured lookup;
//! 3. configured lookup -> single-row equality query, failing on zero
//!    or multiple matches;
//! 4. schema-driven cast.

use log::debug;
use rusqlite::Connection;

use crate::{
    catalog::{Catalog, ColumnKind, ensure_identifier},
    error::{ImportError, ImportResult},
    header::FieldSpec,
    value::{Value, cast_value, from_sql_ref},
};

pub struct Resolver<'c> {
    conn: &'c Connection,
    catalog: &'c Catalog<'c>,
    /// Destination table, used for column metadata.
    table: String,
}

impl<'c> Resolver<'c> {
    pub fn new(conn: &'c Connection, catalog: &'c Catalog<'c>, table: &str) -> Self {
        Resolver {
            conn,
            catalog,
            table: table.to_string(),
        }
    }

    pub fn resolve(
        &self,
        spec: &FieldSpec,
        raw: &str,
        row: usize,
    ) -> ImportResult<Option<Value>> {
        if raw.is_empty() || raw.eq_ignore_ascii_case("(null)") {
            return Ok(None);
        }

        let kind = self.catalog.column_kind(&self.table, &spec.target_column)?;

        // Literal ids bypass the lookup even when one is configured.
        if kind.is_numeric() && raw.bytes().all(|b| b.is_ascii_digit()) {
            return self
                .cast(spec, raw, kind, row)
                .map(Some);
        }

        if let Some(lookup_column) = spec.lookup_column.as_deref() {
            return self.lookup(spec, lookup_column, raw, row).map(Some);
        }

        self.cast(spec, raw, kind, row).map(Some)
    }

    fn cast(
        &self,
        spec: &FieldSpec,
        raw: &str,
        kind: ColumnKind,
        row: usize,
    ) -> ImportResult<Value> {
        let max_length = self.catalog.max_length(&self.table, &spec.target_column)?;
        cast_value(raw, kind, max_length).map_err(|failure| ImportError::TypeCast {
            row,
            column: spec.column_index,
            token: spec.original.clone(),
            value: raw.to_string(),
            kind,
            reason: failure.reason,
        })
    }

    /// `SELECT target FROM lookup_table WHERE lookup_column = ?1`,
    /// collecting every match so zero and many are distinguishable.
    fn lookup(
        &self,
        spec: &FieldSpec,
        lookup_column: &str,
        raw: &str,
        row: usize,
    ) -> ImportResult<Value> {
        let table = spec.lookup_table().ok_or_else(|| {
            ImportError::Configuration(format!(
                "cannot derive lookup table for token '{}'",
                spec.original
            ))
        })?;
        ensure_identifier(&table)?;
        ensure_identifier(lookup_column)?;
        ensure_identifier(&spec.target_column)?;

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            spec.target_column, table, lookup_column
        );
        debug!("row {row} lookup: {sql} [{raw}]");
        let mut stmt = self.conn.prepare(&sql)?;
        let matches = stmt
            .query_map([raw], |r| Ok(from_sql_ref(r.get_ref(0)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        match matches.len() {
            0 => Err(ImportError::LookupNotFound {
                row,
                column: spec.column_index,
                token: spec.original.clone(),
                table,
                lookup_column: lookup_column.to_string(),
                value: raw.to_string(),
            }),
            1 => matches
                .into_iter()
                .next()
                .flatten()
                .ok_or_else(|| ImportError::LookupNotFound {
                    row,
                    column: spec.column_index,
                    token: spec.original.clone(),
                    table,
                    lookup_column: lookup_column.to_string(),
                    value: raw.to_string(),
                }),
            n => Err(ImportError::LookupAmbiguous {
                row,
                column: spec.column_index,
                token: spec.original.clone(),
                table,
                lookup_column: lookup_column.to_string(),
                value: raw.to_string(),
                matches: n,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::FieldSpec;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE c_bpartner (
                 c_bpartner_id INTEGER PRIMARY KEY,
                 value VARCHAR(40),
                 name VARCHAR(60)
             );
             CREATE TABLE test_contact (
                 test_contact_id INTEGER PRIMARY KEY,
                 name VARCHAR(60),
                 c_bpartner_id INTEGER,
                 salary DECIMAL(10,2),
                 isactive CHAR(1),
                 birthday DATE
             );
             INSERT INTO c_bpartner VALUES (1001, 'ACME01', 'Acme Corp');
             INSERT INTO c_bpartner VALUES (1002, 'DUP', 'Dup One');
             INSERT INTO c_bpartner VALUES (1003, 'DUP', 'Dup Two');",
        )
        .unwrap();
        conn
    }

    fn resolver_fixture(conn: &Connection) -> (Catalog<'_>, String) {
        (Catalog::new(conn), "test_contact".to_string())
    }

    #[test]
    fn null_tokens_short_circuit() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let spec = FieldSpec::parse("C_BPartner_ID[Value]", 1);
        assert_eq!(resolver.resolve(&spec, "", 2).unwrap(), None);
        assert_eq!(resolver.resolve(&spec, "(null)", 2).unwrap(), None);
        assert_eq!(resolver.resolve(&spec, "(NULL)", 2).unwrap(), None);
        assert_eq!(resolver.resolve(&spec, "(Null)", 2).unwrap(), None);
    }

    #[test]
    fn lookup_returns_single_match() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let spec = FieldSpec::parse("C_BPartner_ID[Value]", 2);
        assert_eq!(
            resolver.resolve(&spec, "ACME01", 2).unwrap(),
            Some(Value::Integer(1001))
        );
    }

    #[test]
    fn lookup_zero_matches_fails() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let spec = FieldSpec::parse("C_BPartner_ID[Value]", 2);
        let err = resolver.resolve(&spec, "MISSING", 4).unwrap_err();
        match err {
            ImportError::LookupNotFound {
                row,
                column,
                table,
                lookup_column,
                value,
                ..
            } => {
                assert_eq!(row, 4);
                assert_eq!(column, 2);
                assert_eq!(table, "C_BPartner");
                assert_eq!(lookup_column, "Value");
                assert_eq!(value, "MISSING");
            }
            other => panic!("expected LookupNotFound, got {other:?}"),
        }
    }

    #[test]
    fn lookup_many_matches_is_ambiguous() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let spec = FieldSpec::parse("C_BPartner_ID[Value]", 2);
        let err = resolver.resolve(&spec, "DUP", 3).unwrap_err();
        match err {
            ImportError::LookupAmbiguous { matches, .. } => assert_eq!(matches, 2),
            other => panic!("expected LookupAmbiguous, got {other:?}"),
        }
    }

    #[test]
    fn all_digit_cell_bypasses_lookup() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let spec = FieldSpec::parse("C_BPartner_ID[Value]", 2);
        // 9999 matches nothing in c_bpartner, but the destination is
        // numeric so the literal wins without a query.
        assert_eq!(
            resolver.resolve(&spec, "9999", 2).unwrap(),
            Some(Value::Integer(9999))
        );
    }

    #[test]
    fn direct_cast_by_column_kind() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);

        let name = FieldSpec::parse("Name", 1);
        assert_eq!(
            resolver.resolve(&name, "Acme", 2).unwrap(),
            Some(Value::Text("Acme".into()))
        );

        let salary = FieldSpec::parse("Salary", 3);
        assert_eq!(
            resolver.resolve(&salary, "1234.56", 2).unwrap(),
            Some(Value::Decimal("1234.56".parse().unwrap()))
        );

        let active = FieldSpec::parse("IsActive", 4);
        assert_eq!(
            resolver.resolve(&active, "yes", 2).unwrap(),
            Some(Value::Boolean(true))
        );

        let birthday = FieldSpec::parse("Birthday", 5);
        assert!(matches!(
            resolver.resolve(&birthday, "1990-01-31", 2).unwrap(),
            Some(Value::Date(_))
        ));
    }

    #[test]
    fn cast_failure_carries_coordinates() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let salary = FieldSpec::parse("Salary", 3);
        let err = resolver.resolve(&salary, "lots", 7).unwrap_err();
        match err {
            ImportError::TypeCast {
                row,
                column,
                token,
                value,
                kind,
                ..
            } => {
                assert_eq!(row, 7);
                assert_eq!(column, 3);
                assert_eq!(token, "Salary");
                assert_eq!(value, "lots");
                assert_eq!(kind, ColumnKind::Decimal);
            }
            other => panic!("expected TypeCast, got {other:?}"),
        }
    }

    #[test]
    fn text_too_long_is_type_cast_error() {
        let conn = test_conn();
        let (catalog, table) = resolver_fixture(&conn);
        let resolver = Resolver::new(&conn, &catalog, &table);
        let name = FieldSpec::parse("Name", 1);
        let long = "x".repeat(61);
        let err = resolver.resolve(&name, &long, 2).unwrap_err();
        assert!(matches!(err, ImportError::TypeCast { .. }));
    }
}
