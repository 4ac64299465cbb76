//! Reconciling the source document with the remote catalog.
//!
//! A run has three phases:
//!
//! - **Stage**: the source document and a freshly populated catalog
//!   document are written to the two sides of the staging store
//! - **Classify**: the diff engine turns the staged differences into
//!   added, updated and deleted entities
//! - **Apply**: a dry run prints the changes; a commit writes them to the
//!   catalog in dependency order
//!
//! # Example
//!
//! ```ignore
//! use metadoc::catalog::{CatalogClient, HttpTransport};
//! use metadoc::sync::{run, RunOptions};
//!
//! let mut client = CatalogClient::new(HttpTransport::new(root), "warehouse");
//! let report = run(&store, document, &mut client, &RunOptions::default()).await?;
//! ```

mod commit;
pub mod preview;
mod run;
pub mod types;

pub use commit::commit;
pub use preview::{preview_lines, print_preview, print_report};
pub use run::{dry_run_report, run};
pub use types::{DEFAULT_MAX_PREVIEW, KindReport, RunMode, RunOptions, RunReport};
