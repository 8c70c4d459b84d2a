//! repograph - index mined repository history into a property graph
//!
//! Record collections (commits, developers, branches, files, methods and
//! their relationships) are deduplicated, upserted in batches into a graph
//! store with merge semantics, and enriched with per-file blame.

pub mod batch;
pub mod blame;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod upsert;

pub use cache::RecordSet;
pub use config::IndexConfig;
pub use pipeline::{IndexCoordinator, IndexStats};
