//! Run options and the per-run report.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Entries printed per list in a dry-run preview unless configured otherwise.
pub const DEFAULT_MAX_PREVIEW: usize = 35;

/// Whether a run writes to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Classify and print changes only.
    DryRun,
    #[default]
    Commit,
}

impl RunMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::Commit => "commit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Maximum entries printed per list in a preview.
    pub max_preview: usize,
    /// Suppress the preview on stdout (JSON output).
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Commit,
            max_preview: DEFAULT_MAX_PREVIEW,
            quiet: false,
        }
    }
}

/// Outcome counts for one entity kind.
///
/// In a dry run `added`/`updated`/`deleted` count classified changes; in a
/// commit they count successful writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KindReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Writes the catalog rejected.
    pub failed: usize,
    /// Changes not attempted: no remote ID, or a parent write failed.
    pub skipped: usize,
}

impl KindReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

/// Summary of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sets: KindReport,
    pub items: KindReport,
    pub relationships: KindReport,
    pub joins: KindReport,
}

impl RunReport {
    #[must_use]
    pub fn new(mode: RunMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            started_at: now,
            finished_at: now,
            sets: KindReport::default(),
            items: KindReport::default(),
            relationships: KindReport::default(),
            joins: KindReport::default(),
        }
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.sets.failed + self.items.failed + self.relationships.failed + self.joins.failed
    }

    #[must_use]
    pub const fn changes(&self) -> usize {
        self.sets.total() + self.items.total() + self.relationships.total() + self.joins.total()
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let mut report = RunReport::new(RunMode::Commit);
        report.sets.added = 1;
        report.items.added = 2;
        report.items.failed = 1;
        report.joins.skipped = 3;

        assert_eq!(report.changes(), 3);
        assert_eq!(report.failed(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "commit");
        assert_eq!(json["items"]["failed"], 1);
    }

    #[test]
    fn test_default_options() {
        let options = RunOptions::default();
        assert_eq!(options.mode, RunMode::Commit);
        assert_eq!(options.max_preview, DEFAULT_MAX_PREVIEW);
    }
}
