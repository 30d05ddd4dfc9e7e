//! Dynamic statement construction and execution.
//!
//! Assembles one parameterized INSERT or UPDATE per row from the
//! resolved column set. Inserts attach the system-managed columns the
//! row did not supply (primary key, client/org scope, active flag,
//! audit trail, unique identifier); updates target the key-flagged
//! columns, falling back to a client-scoped bulk update when the header
//! flags no keys.

use std::fmt;

use chrono::Local;
use log::debug;
use rusqlite::{Connection, params_from_iter};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    catalog::{Catalog, ensure_identifier},
    error::{ImportError, ImportResult},
    header::FieldSpec,
    template::{ImportTemplate, Session, first_non_zero},
    value::Value,
};

/// Insertion-ordered column -> value mapping for one row. Built fresh
/// per row and consumed immediately by the statement builder.
#[derive(Debug, Default)]
pub struct ResolvedRow {
    columns: Vec<(String, Option<Value>)>,
}

impl ResolvedRow {
    pub fn new() -> Self {
        ResolvedRow::default()
    }

    /// Set a column, replacing in place so insertion order is stable.
    pub fn set(&mut self, column: &str, value: Option<Value>) {
        match self.position(column) {
            Some(idx) => self.columns[idx].1 = value,
            None => self.columns.push((column.to_string(), value)),
        }
    }

    /// Fill a column only when it is absent or null, mirroring the
    /// defaulting rule: a caller-supplied value is never overwritten.
    pub fn set_default(&mut self, column: &str, value: Value) {
        match self.position(column) {
            Some(idx) => {
                if self.columns[idx].1.is_none() {
                    self.columns[idx].1 = Some(value);
                }
            }
            None => self.columns.push((column.to_string(), Some(value))),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column)
            .and_then(|idx| self.columns[idx].1.as_ref())
    }

    pub fn is_set(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn remove(&mut self, column: &str) -> Option<Option<Value>> {
        self.position(column)
            .map(|idx| self.columns.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_ref()))
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RowAction {
    Inserted,
    Updated { rows: usize },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    pub row: usize,
    #[serde(flatten)]
    pub action: RowAction,
}

/// Structured run result: totals plus one outcome per data row.
#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub outcomes: Vec<RowOutcome>,
}

impl ImportSummary {
    pub fn record(&mut self, row: usize, action: RowAction) {
        match &action {
            RowAction::Inserted => self.inserted += 1,
            RowAction::Updated { rows } => self.updated += rows,
            RowAction::Skipped => self.skipped += 1,
        }
        self.outcomes.push(RowOutcome { row, action });
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Import finished. Inserted={}, Updated={}",
            self.inserted, self.updated
        )
    }
}

pub struct Executor<'c> {
    conn: &'c Connection,
    catalog: &'c Catalog<'c>,
    table: String,
    template: &'c ImportTemplate,
    session: Session,
}

impl<'c> Executor<'c> {
    pub fn new(
        conn: &'c Connection,
        catalog: &'c Catalog<'c>,
        table: &str,
        template: &'c ImportTemplate,
        session: Session,
    ) -> Self {
        Executor {
            conn,
            catalog,
            table: table.to_string(),
            template,
            session,
        }
    }

    /// INSERT one row, attaching system columns the row does not
    /// already supply. Every system column is guarded by the catalog so
    /// arbitrary target tables work.
    pub fn insert_row(&self, mut row: ResolvedRow, row_number: usize) -> ImportResult<RowAction> {
        let pk_column = format!("{}_ID", self.table);
        if self.catalog.has_column(&self.table, &pk_column)? && !row.is_set(&pk_column) {
            let next = self.catalog.next_primary_key(&self.table)?;
            row.set_default(&pk_column, Value::Integer(next));
        }

        let client = first_non_zero(&[self.template.client_id, self.session.client_id]);
        let org = first_non_zero(&[self.template.org_id, self.session.org_id]);
        if self.catalog.has_column(&self.table, "AD_Client_ID")? {
            row.set_default("AD_Client_ID", Value::Integer(client));
        }
        if self.catalog.has_column(&self.table, "AD_Org_ID")? {
            row.set_default("AD_Org_ID", Value::Integer(org));
        }
        if self.catalog.has_column(&self.table, "IsActive")? {
            row.set_default("IsActive", Value::Boolean(true));
        }

        let now = Local::now().naive_local();
        if self.catalog.has_column(&self.table, "Created")? {
            row.set_default("Created", Value::DateTime(now));
        }
        if self.catalog.has_column(&self.table, "CreatedBy")? {
            row.set_default("CreatedBy", Value::Integer(self.session.user_id));
        }
        if self.catalog.has_column(&self.table, "Updated")? {
            row.set_default("Updated", Value::DateTime(now));
        }
        if self.catalog.has_column(&self.table, "UpdatedBy")? {
            row.set_default("UpdatedBy", Value::Integer(self.session.user_id));
        }
        if self.catalog.has_column(&self.table, "UUID")? {
            row.set_default("UUID", Value::Text(Uuid::new_v4().to_string()));
        }

        let mut names = Vec::with_capacity(row.len());
        let mut params: Vec<Option<&Value>> = Vec::with_capacity(row.len());
        for (name, value) in row.iter() {
            ensure_identifier(name)?;
            names.push(name.to_string());
            params.push(value);
        }
        let placeholders = (1..=names.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(","),
            placeholders
        );
        debug!("row {row_number}: {sql}");
        self.conn.execute(&sql, params_from_iter(params))?;
        Ok(RowAction::Inserted)
    }

    /// UPDATE one row. Key-flagged specs form the AND-joined WHERE
    /// clause; without keys the update is client-scoped and bulk.
    pub fn update_row(
        &self,
        mut row: ResolvedRow,
        field_specs: &[FieldSpec],
        row_number: usize,
    ) -> ImportResult<RowAction> {
        let key_columns: Vec<&FieldSpec> =
            field_specs.iter().filter(|spec| spec.is_key).collect();

        if key_columns.is_empty() {
            return self.bulk_update(row, row_number);
        }

        let mut predicates = Vec::with_capacity(key_columns.len());
        let mut key_values: Vec<Option<Value>> = Vec::with_capacity(key_columns.len());
        for spec in &key_columns {
            ensure_identifier(&spec.target_column)?;
            let value = row.remove(&spec.target_column).flatten();
            predicates.push(&spec.target_column);
            key_values.push(value);
        }

        if row.is_empty() {
            // Nothing to set once the keys are carved out.
            return Ok(RowAction::Skipped);
        }

        let mut assignments = Vec::with_capacity(row.len());
        let mut params: Vec<Option<&Value>> = Vec::with_capacity(row.len() + key_values.len());
        let mut index = 0usize;
        for (name, value) in row.iter() {
            ensure_identifier(name)?;
            index += 1;
            assignments.push(format!("{name}=?{index}"));
            params.push(value);
        }
        let mut where_parts = Vec::with_capacity(predicates.len());
        for (column, value) in predicates.iter().zip(&key_values) {
            index += 1;
            where_parts.push(format!("{column}=?{index}"));
            params.push(value.as_ref());
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(","),
            where_parts.join(" AND ")
        );
        debug!("row {row_number}: {sql}");
        let affected = self.conn.execute(&sql, params_from_iter(params))?;
        if affected == 0 {
            let predicate = predicates
                .iter()
                .zip(&key_values)
                .map(|(column, value)| {
                    let shown = value
                        .as_ref()
                        .map(Value::as_display)
                        .unwrap_or_else(|| "NULL".to_string());
                    format!("{column}='{shown}'")
                })
                .collect::<Vec<_>>()
                .join(" AND ");
            return Err(ImportError::RecordNotFound {
                row: row_number,
                predicate,
            });
        }
        Ok(RowAction::Updated { rows: affected })
    }

    /// Bulk update across every row of the resolved client. Zero
    /// affected rows is not an error here.
    fn bulk_update(&self, row: ResolvedRow, row_number: usize) -> ImportResult<RowAction> {
        if row.is_empty() {
            return Ok(RowAction::Skipped);
        }
        let client = first_non_zero(&[self.template.client_id, self.session.client_id]);

        let mut assignments = Vec::with_capacity(row.len());
        let mut params: Vec<Option<&Value>> = Vec::with_capacity(row.len());
        let mut index = 0usize;
        for (name, value) in row.iter() {
            ensure_identifier(name)?;
            index += 1;
            assignments.push(format!("{name}=?{index}"));
            params.push(value);
        }
        let client_value = Value::Integer(client);
        index += 1;
        let sql = format!(
            "UPDATE {} SET {} WHERE AD_Client_ID=?{index}",
            self.table,
            assignments.join(","),
        );
        params.push(Some(&client_value));
        debug!("row {row_number}: {sql}");
        let affected = self.conn.execute(&sql, params_from_iter(params))?;
        Ok(RowAction::Updated { rows: affected })
    }
}
