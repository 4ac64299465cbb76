//! One end-to-end sync run.

use super::commit::commit;
use super::preview::print_preview;
use super::types::{KindReport, RunMode, RunOptions, RunReport};
use crate::catalog::{CatalogClient, Transport};
use crate::diff::{Diff, DiffEngine, Diffs, Keyed};
use crate::error::Result;
use crate::model::Document;
use crate::storage::{Side, StagingStore};
use tracing::info;

fn classified<T: Keyed>(diff: &Diff<T>) -> KindReport {
    KindReport {
        added: diff.added().len(),
        updated: diff.updated().len(),
        deleted: diff.deleted().len(),
        ..KindReport::default()
    }
}

/// Report for a dry run: every classified change, nothing written.
#[must_use]
pub fn dry_run_report(diffs: &Diffs) -> RunReport {
    let mut report = RunReport::new(RunMode::DryRun);
    report.sets = classified(&diffs.sets);
    report.items = classified(&diffs.items);
    report.relationships = classified(&diffs.relationships);
    report.joins = classified(&diffs.joins);
    report
}

/// Stage both snapshots, classify the differences, then preview or commit.
///
/// The staging store is emptied before the source is staged and again
/// after a successful run.
///
/// # Errors
///
/// Fails when the staging store fails, when the catalog cannot be read,
/// or when the catalog returns contradictory entities. Individual write
/// failures during a commit are counted in the report instead.
pub async fn run<T: Transport>(
    store: &StagingStore,
    source: Document,
    client: &mut CatalogClient<T>,
    options: &RunOptions,
) -> Result<RunReport> {
    let started = chrono::Utc::now();
    store.reset()?;

    let staged = store.stage(Side::Source, &source)?;
    info!(?staged, "Staged source document");

    let catalog = client.populate().await?;
    let staged = store.stage(Side::Catalog, &catalog)?;
    info!(?staged, "Staged catalog document");

    let mut diffs = DiffEngine::new(store, &source).diff_all()?;

    let mut report = match options.mode {
        RunMode::DryRun => {
            if !options.quiet {
                print_preview(&diffs, options.max_preview);
            }
            dry_run_report(&diffs)
        }
        RunMode::Commit => commit(client, store, &source, &mut diffs).await?,
    };

    store.reset()?;
    report.started_at = started;
    report.finish();
    info!(
        mode = report.mode.as_str(),
        changes = report.changes(),
        failed = report.failed(),
        "Sync run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ApiResponse, Method};
    use crate::testing::{ScriptedTransport, orders, sales, store};
    use tempfile::TempDir;

    fn empty_catalog() -> ScriptedTransport {
        ScriptedTransport::route(|req| match (req.method, req.path.as_str()) {
            (Method::Get, "/catalog/source/warehouse?expand=sets") => {
                ApiResponse::new(200, r#"{"id":"src-1","name":{"physical":"warehouse"},"sets":[]}"#)
            }
            (Method::Get, "/catalog/source/src-1/sets") => ApiResponse::new(200, r#"{"sets":[]}"#),
            (Method::Get, "/catalog/relationships/source/src-1") => {
                ApiResponse::new(200, r#"{"relationships":[]}"#)
            }
            (Method::Post, "/catalog/source/src-1/set") => ApiResponse::new(201, r#"{"id":"set-1"}"#),
            _ => ApiResponse::new(200, "{}"),
        })
    }

    #[tokio::test]
    async fn test_dry_run_classifies_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut client = CatalogClient::new(empty_catalog(), "warehouse");
        let options = RunOptions {
            mode: RunMode::DryRun,
            quiet: true,
            ..RunOptions::default()
        };

        let report = run(&store, sales(vec![orders()], vec![]), &mut client, &options)
            .await
            .unwrap();

        assert_eq!(report.mode, RunMode::DryRun);
        assert_eq!(report.sets.added, 1);
        assert_eq!(report.items.added, 2);
        assert!(
            client
                .transport()
                .requests()
                .iter()
                .all(|r| r.method == Method::Get)
        );
        assert_eq!(store.counts(Side::Source).unwrap().sets, 0);
    }

    #[tokio::test]
    async fn test_commit_run_writes_and_resets() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut client = CatalogClient::new(empty_catalog(), "warehouse");

        let report = run(&store, sales(vec![orders()], vec![]), &mut client, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.sets.added, 1);
        assert_eq!(report.items.added, 2);
        assert_eq!(report.failed(), 0);
        let calls = client.transport().calls();
        assert!(calls.contains(&"POST /catalog/set/set-1/items".to_string()));
        assert_eq!(store.counts(Side::Catalog).unwrap().sets, 0);
    }

    #[tokio::test]
    async fn test_unreachable_catalog_is_fatal() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let transport = ScriptedTransport::route(|_| ApiResponse::new(502, "bad gateway"));
        let mut client = CatalogClient::new(transport, "warehouse");

        let err = run(&store, sales(vec![orders()], vec![]), &mut client, &RunOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
    }
}
