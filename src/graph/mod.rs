//! Property graph for repository history
//!
//! Pure Rust implementation using petgraph + redb, exposed to the indexer
//! through the merge-only [`GraphBackend`] protocol.

pub mod store;
pub mod store_models;
pub mod traits;

pub use store::GraphStore;
pub use store_models::{
    EdgeLabel, EdgeMerge, GraphEdge, GraphNode, NodeLabel, NodeRef, KEY_FIELD, PROJECT_ID_FIELD,
};
pub use traits::{GraphBackend, StoreError, StoreResult};
