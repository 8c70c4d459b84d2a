//! Store protocol consumed by the indexer

use super::{EdgeMerge, GraphNode, NodeLabel};
use thiserror::Error;

/// Errors surfaced by a graph backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store cannot be reached at all. Fatal for an indexing run.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// A single operation was refused (malformed batch, constraint violation).
    #[error("graph store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Whether the run must stop instead of moving on to the next batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Merge-only interface to a property graph store.
///
/// Every call is a self-contained operation; a failed call leaves the effects
/// of earlier calls in place.
pub trait GraphBackend: Send + Sync {
    /// Health check, verify the store is reachable
    fn ping(&self) -> StoreResult<()>;

    /// Create each node whose `(label, key)` is absent; existing nodes are left
    /// untouched. Returns the number of nodes created.
    fn merge_nodes(&self, nodes: &[GraphNode]) -> StoreResult<usize>;

    /// Create each edge whose endpoints both exist and which is not already
    /// present for the same label and ordered endpoint pair. Attributes are
    /// applied on creation only. Returns the number of edges created.
    fn merge_edges(&self, edges: &[EdgeMerge]) -> StoreResult<usize>;

    /// Create a secondary index if absent. Returns whether it was created.
    fn ensure_index(&self, label: NodeLabel, field: &str) -> StoreResult<bool>;
}
