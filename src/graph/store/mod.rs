//! Embedded graph store using petgraph + redb
//!
//! Nodes are addressed by `(label, key)`; writes follow merge semantics so
//! replaying the same operations converges to the same graph.

use anyhow::{Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::RwLock;
use tracing::debug;

use super::store_models::{EdgeLabel, EdgeMerge, GraphEdge, GraphNode, NodeLabel, NodeRef};
use super::traits::{GraphBackend, StoreError, StoreResult};

type NodeKey = (NodeLabel, String);

/// Graph store backing the indexer
pub struct GraphStore {
    /// In-memory graph
    graph: RwLock<DiGraph<GraphNode, GraphEdge>>,
    /// Node lookup by label and natural key
    node_index: RwLock<HashMap<NodeKey, NodeIndex>>,
    /// Secondary indexes declared through `ensure_index`
    indexes: RwLock<BTreeSet<(NodeLabel, String)>>,
    /// Persistence layer (optional)
    db: Option<redb::Database>,
}

// redb table definitions
const NODES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("nodes");
const EDGES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("edges");
const INDEXES_TABLE: redb::TableDefinition<&str, &[u8]> = redb::TableDefinition::new("indexes");

impl GraphStore {
    /// Create or open a graph store at the given directory
    pub fn new(db_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(db_path)?;

        let db_file = db_path.join("graph.redb");
        let db = redb::Database::create(&db_file).context("Failed to open redb database")?;

        let store = Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: RwLock::new(HashMap::new()),
            indexes: RwLock::new(BTreeSet::new()),
            db: Some(db),
        };

        store.load()?;

        Ok(store)
    }

    /// Create an in-memory only store (no persistence)
    pub fn in_memory() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: RwLock::new(HashMap::new()),
            indexes: RwLock::new(BTreeSet::new()),
            db: None,
        }
    }

    // ==================== Lock Helpers ====================
    //
    // A poisoned lock means a writer panicked mid-update and the graph may be
    // inconsistent. Callers cannot act on that, so these helpers panic.

    fn read_graph(&self) -> std::sync::RwLockReadGuard<'_, DiGraph<GraphNode, GraphEdge>> {
        self.graph
            .read()
            .expect("graph lock poisoned: a thread panicked while holding this lock")
    }

    fn write_graph(&self) -> std::sync::RwLockWriteGuard<'_, DiGraph<GraphNode, GraphEdge>> {
        self.graph
            .write()
            .expect("graph lock poisoned: a thread panicked while holding this lock")
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, HashMap<NodeKey, NodeIndex>> {
        self.node_index
            .read()
            .expect("index lock poisoned: a thread panicked while holding this lock")
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<NodeKey, NodeIndex>> {
        self.node_index
            .write()
            .expect("index lock poisoned: a thread panicked while holding this lock")
    }

    fn read_indexes(&self) -> std::sync::RwLockReadGuard<'_, BTreeSet<(NodeLabel, String)>> {
        self.indexes
            .read()
            .expect("secondary index lock poisoned: a thread panicked while holding this lock")
    }

    fn write_indexes(&self) -> std::sync::RwLockWriteGuard<'_, BTreeSet<(NodeLabel, String)>> {
        self.indexes
            .write()
            .expect("secondary index lock poisoned: a thread panicked while holding this lock")
    }

    // ==================== Queries ====================

    /// Get node by label and natural key
    pub fn get_node(&self, label: NodeLabel, key: &str) -> Option<GraphNode> {
        let graph = self.read_graph();
        let index = self.read_index();

        index
            .get(&(label, key.to_string()))
            .and_then(|&idx| graph.node_weight(idx).cloned())
    }

    /// Get all nodes with a label
    pub fn get_nodes(&self, label: NodeLabel) -> Vec<GraphNode> {
        self.read_graph()
            .node_weights()
            .filter(|n| n.label == label)
            .cloned()
            .collect()
    }

    /// Get all edges with a label as `(source key, target key, properties)`
    pub fn get_edges(&self, label: EdgeLabel) -> Vec<(String, String, GraphEdge)> {
        let graph = self.read_graph();

        graph
            .edge_references()
            .filter(|e| e.weight().label == label)
            .filter_map(|e| {
                let src = graph.node_weight(e.source())?;
                let dst = graph.node_weight(e.target())?;
                Some((src.key.clone(), dst.key.clone(), e.weight().clone()))
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.read_graph().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read_graph().edge_count()
    }

    pub fn count_nodes(&self, label: NodeLabel) -> usize {
        self.read_graph()
            .node_weights()
            .filter(|n| n.label == label)
            .count()
    }

    pub fn count_edges(&self, label: EdgeLabel) -> usize {
        self.read_graph()
            .edge_weights()
            .filter(|e| e.label == label)
            .count()
    }

    /// Secondary indexes declared so far
    pub fn indexes(&self) -> Vec<(NodeLabel, String)> {
        self.read_indexes().iter().cloned().collect()
    }

    pub fn has_index(&self, label: NodeLabel, field: &str) -> bool {
        self.read_indexes().contains(&(label, field.to_string()))
    }

    /// Per-label node and edge counts
    pub fn stats(&self) -> BTreeMap<String, usize> {
        let graph = self.read_graph();
        let mut stats = BTreeMap::new();

        for label in NodeLabel::ALL {
            stats.insert(format!("nodes.{}", label), 0);
        }
        for label in EdgeLabel::ALL {
            stats.insert(format!("edges.{}", label), 0);
        }
        for node in graph.node_weights() {
            *stats.entry(format!("nodes.{}", node.label)).or_insert(0) += 1;
        }
        for edge in graph.edge_weights() {
            *stats.entry(format!("edges.{}", edge.label)).or_insert(0) += 1;
        }

        stats.insert("total_nodes".to_string(), graph.node_count());
        stats.insert("total_edges".to_string(), graph.edge_count());
        stats
    }

    /// Methods attached to a file through `Method` edges
    pub fn file_methods(&self, file_key: &str) -> Vec<GraphNode> {
        self.neighbors(
            NodeLabel::File,
            file_key,
            EdgeLabel::Method,
            Direction::Outgoing,
        )
        .into_iter()
        .map(|(node, _)| node)
        .collect()
    }

    /// Change events recorded for a method, oldest commit first.
    ///
    /// Each entry is the updating commit plus the attributes carried by its
    /// `UpdateMethod` edge.
    pub fn method_change_history(&self, method_key: &str) -> Vec<(GraphNode, GraphEdge)> {
        let mut history = self.neighbors(
            NodeLabel::Method,
            method_key,
            EdgeLabel::UpdateMethod,
            Direction::Incoming,
        );
        history.sort_by_key(|(commit, _)| commit.get_i64("timestamp").unwrap_or(0));
        history
    }

    fn neighbors(
        &self,
        label: NodeLabel,
        key: &str,
        edge_label: EdgeLabel,
        direction: Direction,
    ) -> Vec<(GraphNode, GraphEdge)> {
        let graph = self.read_graph();
        let index = self.read_index();

        let Some(&idx) = index.get(&(label, key.to_string())) else {
            return vec![];
        };

        graph
            .edges_directed(idx, direction)
            .filter(|e| e.weight().label == edge_label)
            .filter_map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                graph
                    .node_weight(other)
                    .map(|n| (n.clone(), e.weight().clone()))
            })
            .collect()
    }

    // ==================== Persistence ====================

    /// Persist graph and indexes to redb
    pub fn save(&self) -> Result<()> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };

        let graph = self.read_graph();

        let write_txn = db.begin_write()?;
        {
            let mut table = write_txn.open_table(NODES_TABLE)?;
            for node in graph.node_weights() {
                let key = format!("node:{}:{}", node.label, node.key);
                let value = serde_json::to_vec(node)?;
                table.insert(key.as_str(), value.as_slice())?;
            }

            let edges: Vec<(NodeRef, NodeRef, GraphEdge)> = graph
                .edge_references()
                .filter_map(|e| {
                    let src = graph.node_weight(e.source())?;
                    let dst = graph.node_weight(e.target())?;
                    Some((
                        NodeRef::new(src.label, src.key.clone()),
                        NodeRef::new(dst.label, dst.key.clone()),
                        e.weight().clone(),
                    ))
                })
                .collect();
            let edges_data = serde_json::to_vec(&edges)?;
            let mut edges_table = write_txn.open_table(EDGES_TABLE)?;
            edges_table.insert("__edges__", edges_data.as_slice())?;

            let indexes: Vec<(NodeLabel, String)> = self.indexes();
            let indexes_data = serde_json::to_vec(&indexes)?;
            let mut indexes_table = write_txn.open_table(INDEXES_TABLE)?;
            indexes_table.insert("__indexes__", indexes_data.as_slice())?;
        }
        write_txn.commit()?;

        debug!(
            "Saved {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }

    /// Load graph from redb
    fn load(&self) -> Result<()> {
        let db = match &self.db {
            Some(db) => db,
            None => return Ok(()),
        };

        let read_txn = db.begin_read()?;

        // Missing tables mean a fresh database
        let nodes_table = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut graph = self.write_graph();
        let mut index = self.write_index();

        for item in nodes_table.range::<&str>(..)? {
            let (key, value) = item?;
            if key.value().starts_with("node:") {
                let node: GraphNode = serde_json::from_slice(value.value())?;
                let node_key = (node.label, node.key.clone());
                let idx = graph.add_node(node);
                index.insert(node_key, idx);
            }
        }

        if let Ok(edges_table) = read_txn.open_table(EDGES_TABLE) {
            if let Some(entry) = edges_table.get("__edges__")? {
                let edges: Vec<(NodeRef, NodeRef, GraphEdge)> =
                    serde_json::from_slice(entry.value())?;
                for (src, dst, edge) in edges {
                    if let (Some(&from), Some(&to)) =
                        (index.get(&(src.label, src.key)), index.get(&(dst.label, dst.key)))
                    {
                        graph.add_edge(from, to, edge);
                    }
                }
            }
        }

        if let Ok(indexes_table) = read_txn.open_table(INDEXES_TABLE) {
            if let Some(entry) = indexes_table.get("__indexes__")? {
                let indexes: Vec<(NodeLabel, String)> = serde_json::from_slice(entry.value())?;
                self.write_indexes().extend(indexes);
            }
        }

        debug!(
            "Loaded {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }
}

/// A batch is applied as a whole or not at all, so malformed entries are
/// caught before anything is written.
fn validate_key(what: &str, key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::Rejected(format!("{} with empty key", what)));
    }
    Ok(())
}

impl GraphBackend for GraphStore {
    fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn merge_nodes(&self, nodes: &[GraphNode]) -> StoreResult<usize> {
        for node in nodes {
            validate_key(node.label.as_str(), &node.key)?;
        }

        // Lock graph before index, same order as every other writer
        let mut graph = self.write_graph();
        let mut index = self.write_index();
        let mut created = 0;

        for node in nodes {
            let node_key = (node.label, node.key.clone());
            if index.contains_key(&node_key) {
                continue;
            }
            let idx = graph.add_node(node.clone());
            index.insert(node_key, idx);
            created += 1;
        }

        Ok(created)
    }

    fn merge_edges(&self, edges: &[EdgeMerge]) -> StoreResult<usize> {
        for edge in edges {
            validate_key(edge.from.label.as_str(), &edge.from.key)?;
            validate_key(edge.to.label.as_str(), &edge.to.key)?;
        }

        let mut graph = self.write_graph();
        let index = self.read_index();
        let mut created = 0;

        for edge in edges {
            let from = index.get(&(edge.from.label, edge.from.key.clone()));
            let to = index.get(&(edge.to.label, edge.to.key.clone()));
            let (Some(&from), Some(&to)) = (from, to) else {
                continue;
            };

            let exists = graph
                .edges_connecting(from, to)
                .any(|e| e.weight().label == edge.label);
            if exists {
                continue;
            }

            graph.add_edge(from, to, GraphEdge::new(edge.label, edge.on_create.clone()));
            created += 1;
        }

        Ok(created)
    }

    fn ensure_index(&self, label: NodeLabel, field: &str) -> StoreResult<bool> {
        if field.trim().is_empty() {
            return Err(StoreError::Rejected(format!(
                "index on {} with empty field name",
                label
            )));
        }
        Ok(self.write_indexes().insert((label, field.to_string())))
    }
}

#[cfg(test)]
mod tests;
