//! SQLite staging layer.
//!
//! Two flattened snapshots of a document live side by side in one file:
//! - `db_*` tables hold the source snapshot
//! - `dh_*` tables hold the catalog snapshot
//!
//! Change detection is plain SQL over both sides; results are decoded into
//! typed rows before they reach the diff engine.
//!
//! # Submodules
//!
//! - [`schema`] - Staging template and connection pragmas
//! - [`queries`] - Change-detection query text
//! - [`rows`] - Typed change rows
//! - [`staging`] - The store itself

pub mod queries;
pub mod rows;
pub mod schema;
pub mod staging;

pub use queries::{ChangeQueries, QuerySet};
pub use rows::{
    Changes, ItemChanges, ItemRow, ItemUpdateRow, JoinChanges, JoinRow, JoinUpdateRow,
    RelationshipChanges, RelationshipRow, RelationshipUpdateRow, SetChanges, SetRow, SetUpdateRow,
};
pub use staging::{DEFAULT_BATCH_SIZE, Side, StageCounts, StagingConfig, StagingStore};
