pub mod catalog;
pub mod cli;
pub mod error;
pub mod exec;
pub mod header;
pub mod import;
pub mod ingest;
pub mod resolve;
pub mod template;
pub mod value;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};
use rusqlite::Connection;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => import::execute(&args),
        Commands::Inspect(args) => handle_inspect(&args),
    }
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let conn = Connection::open(&args.db)
        .with_context(|| format!("Opening database {:?}", args.db))?;
    let catalog = catalog::Catalog::new(&conn);
    let columns = catalog
        .columns(&args.table)
        .with_context(|| format!("Introspecting table '{}'", args.table))?;
    if columns.is_empty() {
        anyhow::bail!("table '{}' has no columns or does not exist", args.table);
    }
    info!("table '{}' defines {} column(s)", args.table, columns.len());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
    } else {
        for column in &columns {
            match column.max_length {
                Some(max) => println!("{}\t{} ({max})", column.name, column.kind),
                None => println!("{}\t{}", column.name, column.kind),
            }
        }
    }
    Ok(())
}
