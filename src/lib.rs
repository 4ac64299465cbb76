//! metadoc - keep a metadata catalog in step with the databases it describes
//!
//! This crate provides the core functionality for the `metadoc` CLI tool.
//!
//! # Architecture
//!
//! - [`model`] - Metadata document model (source, schemas, sets, items, relationships)
//! - [`storage`] - SQLite staging store holding the source and catalog snapshots
//! - [`diff`] - Change classification between the staged snapshots
//! - [`catalog`] - Remote catalog REST client
//! - [`sync`] - End-to-end sync runs: preview and commit
//! - [`config`] - Configuration management and source extraction
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
