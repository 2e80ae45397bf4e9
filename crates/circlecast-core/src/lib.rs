//! circlecast-core: shared error type, configuration and identifiers.
//!
//! This crate is the foundational dependency for the other circlecast crates.
//! It carries no I/O of its own beyond parsing configuration text.

pub mod config;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
