use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Node labels in the repository graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeLabel {
    Developer,
    Commit,
    Branch,
    File,
    Filetype,
    Method,
    Blame,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 7] = [
        NodeLabel::Developer,
        NodeLabel::Commit,
        NodeLabel::Branch,
        NodeLabel::File,
        NodeLabel::Filetype,
        NodeLabel::Method,
        NodeLabel::Blame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Developer => "Developer",
            NodeLabel::Commit => "Commit",
            NodeLabel::Branch => "Branch",
            NodeLabel::File => "File",
            NodeLabel::Filetype => "Filetype",
            NodeLabel::Method => "Method",
            NodeLabel::Blame => "Blame",
        }
    }

    /// Fields that get a secondary index once this label has been written.
    ///
    /// Developers are shared across projects and carry no project id.
    pub fn indexed_fields(&self) -> &'static [&'static str] {
        match self {
            NodeLabel::Developer => &[KEY_FIELD],
            _ => &[KEY_FIELD, PROJECT_ID_FIELD],
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship labels in the repository graph
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeLabel {
    Parent,
    BranchCommit,
    Author,
    UpdateFile,
    FileType,
    Method,
    UpdateMethod,
    GitBlame,
}

impl EdgeLabel {
    pub const ALL: [EdgeLabel; 8] = [
        EdgeLabel::Parent,
        EdgeLabel::BranchCommit,
        EdgeLabel::Author,
        EdgeLabel::UpdateFile,
        EdgeLabel::FileType,
        EdgeLabel::Method,
        EdgeLabel::UpdateMethod,
        EdgeLabel::GitBlame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Parent => "Parent",
            EdgeLabel::BranchCommit => "BranchCommit",
            EdgeLabel::Author => "Author",
            EdgeLabel::UpdateFile => "UpdateFile",
            EdgeLabel::FileType => "FileType",
            EdgeLabel::Method => "Method",
            EdgeLabel::UpdateMethod => "UpdateMethod",
            EdgeLabel::GitBlame => "GitBlame",
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the natural-key property every node carries
pub const KEY_FIELD: &str = "hash";

/// Name of the project id property
pub const PROJECT_ID_FIELD: &str = "project_id";

/// A node in the repository graph, and the payload of a merge-by-key operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub label: NodeLabel,
    pub key: String,
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn project_id(&self) -> Option<&str> {
        self.get_str(PROJECT_ID_FIELD)
    }
}

/// Identifies an edge endpoint by label and natural key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>) -> Self {
        Self {
            label,
            key: key.into(),
        }
    }
}

/// A merge-by-endpoint-pair operation.
///
/// `on_create` is applied only when the edge does not exist yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EdgeMerge {
    pub label: EdgeLabel,
    pub from: NodeRef,
    pub to: NodeRef,
    pub on_create: Map<String, Value>,
}

impl EdgeMerge {
    pub fn new(label: EdgeLabel, from: NodeRef, to: NodeRef) -> Self {
        Self {
            label,
            from,
            to,
            on_create: Map::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.on_create = attributes;
        self
    }
}

/// An edge weight as stored in the graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub label: EdgeLabel,
    pub properties: Map<String, Value>,
}

impl GraphEdge {
    pub fn new(label: EdgeLabel, properties: Map<String, Value>) -> Self {
        Self { label, properties }
    }
}
