use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::import::Mode;

#[derive(Debug, Parser)]
#[command(author, version, about = "Import delimited files into database tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a delimited file into a target table, driven by the
    /// header mapping grammar or a stored template
    Import(ImportArgs),
    /// Show a table's columns as the catalog maps them (kind, length)
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Input file to import (UTF-8, one record per non-blank line)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// SQLite database holding the target table and catalog
    #[arg(short = 'd', long = "db")]
    pub db: PathBuf,
    /// Stored import template id (supplies tab, header, defaults)
    #[arg(short = 't', long = "template", conflicts_with = "table")]
    pub template: Option<i64>,
    /// Target table name, bypassing the template/tab catalog
    #[arg(long = "table")]
    pub table: Option<String>,
    /// Header definition override (comma-separated tokens); the file's
    /// first line is then treated as data
    #[arg(long = "header")]
    pub header: Option<String>,
    /// Import mode: insert new rows or update existing ones
    #[arg(long = "mode", value_enum, default_value = "insert")]
    pub mode: Mode,
    /// Default client identifier for scoping and inserts
    #[arg(long = "client", default_value_t = 0)]
    pub client: i64,
    /// Default organization identifier for inserts
    #[arg(long = "org", default_value_t = 0)]
    pub org: i64,
    /// Acting user identifier for audit columns
    #[arg(long = "user", default_value_t = 0)]
    pub user: i64,
    /// Run the full import but roll the transaction back at the end
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Emit the structured summary as JSON instead of text
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// SQLite database to introspect
    #[arg(short = 'd', long = "db")]
    pub db: PathBuf,
    /// Table to describe
    #[arg(long = "table")]
    pub table: String,
    /// Emit column metadata as JSON
    #[arg(long = "json")]
    pub json: bool,
}
