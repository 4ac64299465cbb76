//! `metadoc reset`: empty the staging database.

use crate::config::resolve_staging_path;
use crate::error::{Error, Result};
use crate::storage::{Side, StagingConfig, StagingStore};
use std::path::PathBuf;

/// Execute the reset command.
pub fn execute(staging: Option<&PathBuf>, json: bool) -> Result<()> {
    let path = resolve_staging_path(staging.map(PathBuf::as_path)).ok_or_else(|| {
        Error::Configuration("cannot locate a home directory for the staging database".into())
    })?;

    let store = StagingStore::open(&path, StagingConfig::default())?;
    let source = store.counts(Side::Source)?;
    let catalog = store.counts(Side::Catalog)?;
    store.reset()?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "staging": path.display().to_string(),
            "cleared": { "source": source, "catalog": catalog },
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Staging database reset: {}", path.display());
    }
    Ok(())
}
