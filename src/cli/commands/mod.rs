//! Command implementations.

pub mod reset;
pub mod sync;
