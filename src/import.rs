//! Import orchestration: parse -> ingest/validate -> per-row resolve ->
//! execute.
//!
//! The run is a single sequential pass: one row at a time, synchronous
//! point lookups inline before each write, no retry. The engine itself
//! never opens, commits, or rolls back transactions; `execute()` (the
//! CLI caller) wraps the whole run in one transaction and commits on
//! success.

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use rusqlite::Connection;

use crate::{
    catalog::Catalog,
    cli::ImportArgs,
    error::ImportResult,
    exec::{Executor, ImportSummary, ResolvedRow},
    ingest,
    resolve::Resolver,
    template::{ImportTemplate, Session},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Mode {
    Insert,
    Update,
}

/// Run one import inside the caller's ambient transaction context.
pub fn run_import(
    conn: &Connection,
    template: &ImportTemplate,
    session: Session,
    input: &std::path::Path,
    mode: Mode,
) -> ImportResult<ImportSummary> {
    let catalog = Catalog::new(conn);
    let table = if template.tab_id > 0 {
        catalog.resolve_table_name(template.tab_id)?
    } else {
        template.name.clone()
    };
    info!(
        "importing '{}' into {} (mode {:?}, template '{}')",
        input.display(),
        table,
        mode,
        template.name
    );

    let source = ingest::read_source(input, template.header_csv.as_deref())?;
    let resolver = Resolver::new(conn, &catalog, &table);
    let executor = Executor::new(conn, &catalog, &table, template, session);

    let mut summary = ImportSummary::default();
    for raw_row in &source.rows {
        let mut resolved = ResolvedRow::new();
        for (col, spec) in source.field_specs.iter().enumerate() {
            let value = resolver.resolve(spec, raw_row.cell(col), raw_row.row_number)?;
            resolved.set(&spec.target_column, value);
        }
        let action = match mode {
            Mode::Insert => executor.insert_row(resolved, raw_row.row_number)?,
            Mode::Update => {
                executor.update_row(resolved, &source.field_specs, raw_row.row_number)?
            }
        };
        debug!("row {}: {action:?}", raw_row.row_number);
        summary.record(raw_row.row_number, action);
    }

    info!("{summary}");
    Ok(summary)
}

/// CLI entry point: opens the database, loads or synthesizes the
/// template, and owns the single wrapping transaction.
pub fn execute(args: &ImportArgs) -> Result<()> {
    let mut conn = Connection::open(&args.db)
        .with_context(|| format!("Opening database {:?}", args.db))?;

    let mut template = match (&args.table, args.template) {
        (Some(table), _) => ImportTemplate::direct(
            table,
            args.header.clone(),
            args.client,
            args.org,
        ),
        (None, Some(id)) => ImportTemplate::load(&conn, id)
            .with_context(|| format!("Loading import template {id}"))?,
        (None, None) => anyhow::bail!("either --template or --table is required"),
    };
    if args.header.is_some() {
        template.header_csv = args.header.clone();
    }
    let session = Session {
        client_id: args.client,
        org_id: args.org,
        user_id: args.user,
    };

    let tx = conn.transaction().context("Starting transaction")?;
    let summary = run_import(&tx, &template, session, &args.input, args.mode)
        .with_context(|| format!("Importing {:?}", args.input))?;
    if args.dry_run {
        tx.rollback().context("Rolling back dry run")?;
        info!("dry run: transaction rolled back");
    } else {
        tx.commit().context("Committing import")?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}
