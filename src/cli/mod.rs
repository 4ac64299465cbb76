//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// metadoc - reconcile database metadata with a remote catalog
#[derive(Parser, Debug)]
#[command(name = "metadoc", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Staging database path (default: ~/.metadoc/staging.db)
    #[arg(long, global = true, env = "METADOC_STAGING_DB")]
    pub staging: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a source document with the catalog
    Sync(SyncArgs),

    /// Empty both sides of the staging database
    Reset,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Serialized source document (JSON)
    #[arg(long, short = 'd')]
    pub document: PathBuf,

    /// Observed keys of JSON columns: {"schema.set.column": ["key", ..]}
    #[arg(long)]
    pub json_keys: Option<PathBuf>,

    /// Catalog root URL; may embed user:password for token requests [env: METADOC_CATALOG_URL]
    #[arg(long)]
    pub url: Option<String>,

    /// Catalog source ID or name [env: METADOC_SOURCE]
    #[arg(long)]
    pub source: Option<String>,

    /// Pre-issued bearer token [env: METADOC_API_KEY]
    #[arg(long)]
    pub api_key: Option<String>,

    /// Schemas to include (supports * globs, repeatable)
    #[arg(long = "schema", alias = "schemas", value_delimiter = ',')]
    pub schemas: Vec<String>,

    /// Print the changes without writing to the catalog
    #[arg(long)]
    pub dry_run: bool,

    /// Entries shown per list in a dry run [env: METADOC_MAX_PREVIEW]
    #[arg(long)]
    pub max: Option<usize>,
}
