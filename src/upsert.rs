//! Batched merge operations against a [`GraphBackend`]
//!
//! One store call per batch. A rejected batch is logged and skipped; earlier
//! batches stay committed and later ones still run. An unreachable store stops
//! the operation with an error.

use std::num::NonZeroUsize;
use std::time::Instant;
use tracing::{debug, warn};

use crate::batch::{batch_count, batches};
use crate::graph::{EdgeMerge, GraphBackend, GraphNode, NodeLabel, StoreError, StoreResult};
use crate::models::{EdgeRecord, NodeRecord};

/// Outcome of upserting one node or edge kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub label: String,
    pub records: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Nodes or edges newly created in the store
    pub created: usize,
}

impl UpsertReport {
    fn new(label: &str, records: usize) -> Self {
        Self {
            label: label.to_string(),
            records,
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0
    }
}

/// Issues merge-by-key and merge-by-endpoint-pair operations in batches
pub struct UpsertEngine<'a> {
    backend: &'a dyn GraphBackend,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(backend: &'a dyn GraphBackend) -> Self {
        Self { backend }
    }

    /// Merge all records of one node kind, then make sure its secondary
    /// indexes exist.
    pub fn upsert_nodes<R: NodeRecord>(
        &self,
        records: &[R],
        batch_size: NonZeroUsize,
    ) -> StoreResult<UpsertReport> {
        let nodes: Vec<GraphNode> = records.iter().map(NodeRecord::to_node).collect();
        let mut report = UpsertReport::new(R::LABEL.as_str(), nodes.len());

        self.run_batches(&nodes, batch_size, &mut report, |batch| {
            self.backend.merge_nodes(batch)
        })?;
        self.ensure_indexes(R::LABEL)?;

        Ok(report)
    }

    /// Merge all relationship records of one edge kind. Both endpoint kinds
    /// must already be in the store or the edges are silently not created.
    pub fn upsert_edges<R: EdgeRecord>(
        &self,
        records: &[R],
        batch_size: NonZeroUsize,
    ) -> StoreResult<UpsertReport> {
        let edges: Vec<EdgeMerge> = records.iter().map(EdgeRecord::to_merge).collect();
        let mut report = UpsertReport::new(R::LABEL.as_str(), edges.len());

        self.run_batches(&edges, batch_size, &mut report, |batch| {
            self.backend.merge_edges(batch)
        })?;

        Ok(report)
    }

    /// Create the key and project-id indexes for a label if absent
    pub fn ensure_indexes(&self, label: NodeLabel) -> StoreResult<()> {
        for field in label.indexed_fields() {
            match self.backend.ensure_index(label, field) {
                Ok(true) => debug!("Created index on :{}({})", label, field),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Could not create index on :{}({}): {}", label, field, e),
            }
        }
        Ok(())
    }

    fn run_batches<T, F>(
        &self,
        items: &[T],
        batch_size: NonZeroUsize,
        report: &mut UpsertReport,
        mut write: F,
    ) -> StoreResult<()>
    where
        F: FnMut(&[T]) -> Result<usize, StoreError>,
    {
        let total = batch_count(items.len(), batch_size);

        for (i, batch) in batches(items, batch_size).enumerate() {
            let started = Instant::now();
            report.batches += 1;
            match write(batch) {
                Ok(created) => {
                    report.created += created;
                    debug!(
                        "{} batch {}/{}: {} records, {} created in {:?}",
                        report.label,
                        i + 1,
                        total,
                        batch.len(),
                        created,
                        started.elapsed()
                    );
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.failed_batches += 1;
                    warn!(
                        "{} batch {}/{} ({} records) failed: {}",
                        report.label,
                        i + 1,
                        total,
                        batch.len(),
                        e
                    );
                }
            }
        }

        Ok(())
    }
}
