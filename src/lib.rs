//! Quiver: compound top-K vector query engine.
//!
//! Boolean trees of term, range and vector leaves are planned against an
//! immutable collection snapshot, executed with scalar pre-filtering, and
//! merged into one ranked list per query vector.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod index;
pub mod merge;
pub mod metrics;
pub mod planner;
pub mod query;
pub mod schema;
pub mod startup;
pub mod testing;
pub mod types;

pub use engine::QueryEngine;
pub use error::{QuiverError, Result};
