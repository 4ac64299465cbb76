//! `metadoc sync`: extract, stage, diff, then preview or commit.

use crate::catalog::{CatalogClient, HttpTransport};
use crate::cli::SyncArgs;
use crate::config::{DocumentFileExtractor, SourceExtractor, SyncConfig};
use crate::error::{Error, Result};
use crate::model::SchemaFilter;
use crate::storage::{StagingConfig, StagingStore};
use crate::sync::{RunMode, print_report, run};
use std::path::PathBuf;
use tracing::debug;

/// Layer the command-line flags over the environment.
fn config(args: &SyncArgs, staging: Option<&PathBuf>) -> Result<SyncConfig> {
    let mut config = SyncConfig::from_env()?;
    if let Some(url) = &args.url {
        config.catalog_url = Some(url.clone());
    }
    if let Some(source) = &args.source {
        config.source = Some(source.clone());
    }
    if let Some(key) = &args.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(path) = staging {
        config.staging_path = Some(path.clone());
    }
    if let Some(max) = args.max {
        config.max_preview = max;
    }
    config.schemas.clone_from(&args.schemas);
    config.mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Commit
    };
    Ok(config)
}

/// Execute the sync command.
pub fn execute(args: &SyncArgs, staging: Option<&PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let config = config(args, staging)?;
    let endpoint = config.validate()?;
    let staging_path = config.staging_path()?;
    debug!(?config, ?endpoint, "Resolved sync configuration");

    let mut extractor = DocumentFileExtractor::new(&args.document);
    if let Some(keys) = &args.json_keys {
        extractor = extractor.with_observed_keys(keys)?;
    }
    let mut document = extractor.extract(&SchemaFilter::new(&config.schemas))?;
    extractor.expand_json_fields(&mut document)?;

    let store = StagingStore::open(&staging_path, StagingConfig::default())?;

    let source = config.source.clone().unwrap_or_default();
    let mut client = CatalogClient::new(HttpTransport::new(endpoint.root), source);
    if let Some(key) = &config.api_key {
        client = client.with_token(key.clone());
    } else if let Some((user, password)) = endpoint.basic {
        client = client.with_basic_auth(user, password);
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    let options = config.run_options(json || quiet);
    let report = rt.block_on(run(&store, document, &mut client, &options))?;

    if json {
        let output = serde_json::json!({
            "success": report.failed() == 0,
            "staging": staging_path.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet {
        println!();
        print_report(&report);
    }
    Ok(())
}
