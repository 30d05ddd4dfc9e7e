//! Import template entity and ambient session context.
//!
//! The template is read-only to the engine: it supplies the target tab,
//! an optional header definition (same token grammar as file headers,
//! comma-separated), and default client/organization identifiers.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::error::{ImportError, ImportResult};

#[derive(Debug, Clone)]
pub struct ImportTemplate {
    pub template_id: i64,
    pub name: String,
    /// Target tab; the table name is resolved through the catalog.
    /// Zero when the template was synthesized from a direct table name.
    pub tab_id: i64,
    /// When present, the file has no header line of its own.
    pub header_csv: Option<String>,
    pub client_id: i64,
    pub org_id: i64,
}

impl ImportTemplate {
    pub fn load(conn: &Connection, template_id: i64) -> ImportResult<ImportTemplate> {
        if template_id <= 0 {
            return Err(ImportError::Configuration(
                "no import template specified".to_string(),
            ));
        }
        let template = conn
            .query_row(
                "SELECT import_template_id, name, ad_tab_id, header_csv, \
                        ad_client_id, ad_org_id \
                 FROM import_template WHERE import_template_id = ?1",
                [template_id],
                ImportTemplate::from_row,
            )
            .optional()?;
        template.ok_or_else(|| {
            ImportError::Configuration(format!("import template {template_id} not found"))
        })
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<ImportTemplate> {
        let header_csv: Option<String> = row.get("header_csv")?;
        Ok(ImportTemplate {
            template_id: row.get("import_template_id")?,
            name: row.get("name")?,
            tab_id: row.get("ad_tab_id")?,
            header_csv: header_csv.filter(|h| !h.trim().is_empty()),
            client_id: row.get::<_, Option<i64>>("ad_client_id")?.unwrap_or(0),
            org_id: row.get::<_, Option<i64>>("ad_org_id")?.unwrap_or(0),
        })
    }

    /// A template that targets a table directly, bypassing the tab
    /// catalog. Used by the CLI's `--table` path.
    pub fn direct(table: &str, header_csv: Option<String>, client_id: i64, org_id: i64) -> Self {
        ImportTemplate {
            template_id: 0,
            name: table.to_string(),
            tab_id: 0,
            header_csv: header_csv.filter(|h| !h.trim().is_empty()),
            client_id,
            org_id,
        }
    }
}

/// Ambient execution context supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub client_id: i64,
    pub org_id: i64,
    pub user_id: i64,
}

/// First strictly-positive candidate, else 0. Order-sensitive: the
/// template default outranks the ambient context default.
pub fn first_non_zero(candidates: &[i64]) -> i64 {
    candidates.iter().copied().find(|&v| v > 0).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_zero_is_order_sensitive() {
        assert_eq!(first_non_zero(&[0, 3, 5]), 3);
        assert_eq!(first_non_zero(&[7, 3]), 7);
        assert_eq!(first_non_zero(&[0, 0]), 0);
        assert_eq!(first_non_zero(&[]), 0);
        assert_eq!(first_non_zero(&[-1, 2]), 2);
    }

    #[test]
    fn loads_template_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE import_template (
                 import_template_id INTEGER PRIMARY KEY,
                 name TEXT,
                 ad_tab_id INTEGER,
                 header_csv TEXT,
                 ad_client_id INTEGER,
                 ad_org_id INTEGER
             );
             INSERT INTO import_template VALUES (10, 'Partners', 200, NULL, 11, 0);",
        )
        .unwrap();

        let template = ImportTemplate::load(&conn, 10).unwrap();
        assert_eq!(template.name, "Partners");
        assert_eq!(template.tab_id, 200);
        assert_eq!(template.header_csv, None);
        assert_eq!(template.client_id, 11);
        assert_eq!(template.org_id, 0);

        assert!(matches!(
            ImportTemplate::load(&conn, 99),
            Err(ImportError::Configuration(_))
        ));
        assert!(matches!(
            ImportTemplate::load(&conn, 0),
            Err(ImportError::Configuration(_))
        ));
    }

    #[test]
    fn blank_header_definition_is_none() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE import_template (
                 import_template_id INTEGER PRIMARY KEY,
                 name TEXT,
                 ad_tab_id INTEGER,
                 header_csv TEXT,
                 ad_client_id INTEGER,
                 ad_org_id INTEGER
             );
             INSERT INTO import_template VALUES (1, 'T', 1, '   ', NULL, NULL);",
        )
        .unwrap();
        let template = ImportTemplate::load(&conn, 1).unwrap();
        assert_eq!(template.header_csv, None);
        assert_eq!(template.client_id, 0);
    }
}
