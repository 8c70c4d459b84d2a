//! Record types for mined repository history
//!
//! Every entity carries a `hash`: the hex SHA-224 digest of its canonicalized
//! natural key. Records read from a snapshot keep the hash they were mined
//! with; the constructors below compute it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha224};

use crate::graph::{EdgeLabel, EdgeMerge, GraphNode, NodeLabel, NodeRef, KEY_FIELD};

/// Digest a natural key made of one or more identifying fields.
pub fn natural_key(parts: &[&str]) -> String {
    let mut hasher = Sha224::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Canonical form of a repository-relative path
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Anything with a natural key
pub trait Keyed {
    fn key(&self) -> &str;
}

/// An entity that maps to one graph node
pub trait NodeRecord: Keyed + Serialize {
    const LABEL: NodeLabel;

    /// Attributes written when the node is first created
    fn to_node(&self) -> GraphNode {
        let mut properties = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        properties.insert(KEY_FIELD.to_string(), Value::String(self.key().to_string()));
        GraphNode {
            label: Self::LABEL,
            key: self.key().to_string(),
            properties,
        }
    }
}

/// A relationship that maps to one graph edge
pub trait EdgeRecord {
    const LABEL: EdgeLabel;
    const FROM: NodeLabel;
    const TO: NodeLabel;

    fn endpoints(&self) -> (&str, &str);

    /// Attributes applied only when the edge is created
    fn create_attributes(&self) -> Map<String, Value> {
        Map::new()
    }

    fn to_merge(&self) -> EdgeMerge {
        let (from, to) = self.endpoints();
        EdgeMerge::new(
            Self::LABEL,
            NodeRef::new(Self::FROM, from),
            NodeRef::new(Self::TO, to),
        )
        .with_attributes(self.create_attributes())
    }
}

// ==================== Entities ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub hash: String,
    pub name: String,
    pub email: String,
}

impl Developer {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            hash: natural_key(&[&email.trim().to_lowercase()]),
            name: name.to_string(),
            email: email.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub commit_hash: String,
    /// Seconds since the epoch
    pub timestamp: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_merge: bool,
    pub project_id: String,
    #[serde(default)]
    pub dmm_unit_complexity: Option<f64>,
    #[serde(default)]
    pub dmm_unit_interfacing: Option<f64>,
    #[serde(default)]
    pub dmm_unit_size: Option<f64>,
}

impl Commit {
    pub fn new(commit_hash: &str, project_id: &str, timestamp: i64, message: &str) -> Self {
        Self {
            hash: natural_key(&[commit_hash, project_id]),
            commit_hash: commit_hash.to_string(),
            timestamp,
            message: message.to_string(),
            is_merge: false,
            project_id: project_id.to_string(),
            dmm_unit_complexity: None,
            dmm_unit_interfacing: None,
            dmm_unit_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub hash: String,
    pub name: String,
    pub project_id: String,
}

impl Branch {
    pub fn new(name: &str, project_id: &str) -> Self {
        Self {
            hash: natural_key(&[name, project_id]),
            name: name.to_string(),
            project_id: project_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub hash: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub old_path: String,
    #[serde(default)]
    pub new_path: String,
    #[serde(default)]
    pub source_code: String,
    #[serde(default)]
    pub source_code_before: String,
    /// -1 when unknown
    #[serde(default = "unknown_metric")]
    pub nloc: i64,
    #[serde(default = "unknown_metric")]
    pub complexity: i64,
    #[serde(default = "unknown_metric")]
    pub token_count: i64,
    pub project_id: String,
}

fn unknown_metric() -> i64 {
    -1
}

impl File {
    pub fn new(path: &str, project_id: &str) -> Self {
        let path = normalize_path(path);
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Self {
            hash: natural_key(&[&path]),
            name,
            new_path: path.clone(),
            path,
            old_path: String::new(),
            source_code: String::new(),
            source_code_before: String::new(),
            nloc: unknown_metric(),
            complexity: unknown_metric(),
            token_count: unknown_metric(),
            project_id: project_id.to_string(),
        }
    }

    /// Extension including the leading dot, e.g. `.rs`.
    ///
    /// A name without a dot is its own file type (`Makefile`).
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((_, ext)) => format!(".{}", ext),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filetype {
    pub hash: String,
    pub name: String,
    pub project_id: String,
}

impl Filetype {
    /// Keyed on the extension alone, like File is keyed on its path alone, so
    /// a File shared by several projects still has a single Filetype.
    pub fn new(extension: &str, project_id: &str) -> Self {
        Self {
            hash: natural_key(&[extension]),
            name: extension.to_string(),
            project_id: project_id.to_string(),
        }
    }

    pub fn of(file: &File) -> Self {
        Self::new(&file.extension(), &file.project_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub hash: String,
    pub name: String,
    pub long_name: String,
    pub file_name: String,
    #[serde(default = "unknown_metric")]
    pub nloc: i64,
    #[serde(default = "unknown_metric")]
    pub complexity: i64,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub project_id: String,
}

impl Method {
    pub fn new(name: &str, long_name: &str, file_name: &str, project_id: &str) -> Self {
        Self {
            hash: natural_key(&[long_name, file_name, project_id]),
            name: name.to_string(),
            long_name: long_name.to_string(),
            file_name: file_name.to_string(),
            nloc: unknown_metric(),
            complexity: unknown_metric(),
            parameters: Vec::new(),
            project_id: project_id.to_string(),
        }
    }
}

/// Lines of a file last touched by one developer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorLines {
    pub developer: String,
    pub lines: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blame {
    pub hash: String,
    pub name: String,
    pub filename: String,
    /// Ordered by descending line count
    pub blame: Vec<AuthorLines>,
    pub project_id: String,
}

impl Blame {
    pub fn for_file(file: &File, histogram: Vec<AuthorLines>) -> Self {
        Self {
            hash: natural_key(&["blame", &file.hash]),
            name: file.name.clone(),
            filename: file.path.clone(),
            blame: histogram,
            project_id: file.project_id.clone(),
        }
    }

    pub fn lines_by(&self, developer: &str) -> Option<u64> {
        self.blame
            .iter()
            .find(|a| a.developer == developer)
            .map(|a| a.lines)
    }
}

macro_rules! node_record {
    ($ty:ty, $label:expr) => {
        impl Keyed for $ty {
            fn key(&self) -> &str {
                &self.hash
            }
        }

        impl NodeRecord for $ty {
            const LABEL: NodeLabel = $label;
        }
    };
}

node_record!(Developer, NodeLabel::Developer);
node_record!(Commit, NodeLabel::Commit);
node_record!(Branch, NodeLabel::Branch);
node_record!(File, NodeLabel::File);
node_record!(Filetype, NodeLabel::Filetype);
node_record!(Method, NodeLabel::Method);
node_record!(Blame, NodeLabel::Blame);

// ==================== Relationships ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentCommit {
    pub parent_hash: String,
    pub child_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCommit {
    pub branch_hash: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorCommit {
    pub author_hash: String,
    pub commit_hash: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMethod {
    pub file_hash: String,
    pub method_hash: String,
}

/// Per-commit change to a file (added/removed lines, change type, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitFile {
    pub commit_hash: String,
    pub file_hash: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Per-commit change to a method (complexity, nloc, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMethod {
    pub commit_hash: String,
    pub method_hash: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiletypeFile {
    pub filetype_hash: String,
    pub file_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlameFile {
    pub blame_hash: String,
    pub file_hash: String,
}

impl EdgeRecord for ParentCommit {
    const LABEL: EdgeLabel = EdgeLabel::Parent;
    const FROM: NodeLabel = NodeLabel::Commit;
    const TO: NodeLabel = NodeLabel::Commit;

    fn endpoints(&self) -> (&str, &str) {
        (&self.parent_hash, &self.child_hash)
    }
}

impl EdgeRecord for BranchCommit {
    const LABEL: EdgeLabel = EdgeLabel::BranchCommit;
    const FROM: NodeLabel = NodeLabel::Branch;
    const TO: NodeLabel = NodeLabel::Commit;

    fn endpoints(&self) -> (&str, &str) {
        (&self.branch_hash, &self.commit_hash)
    }
}

impl EdgeRecord for AuthorCommit {
    const LABEL: EdgeLabel = EdgeLabel::Author;
    const FROM: NodeLabel = NodeLabel::Developer;
    const TO: NodeLabel = NodeLabel::Commit;

    fn endpoints(&self) -> (&str, &str) {
        (&self.author_hash, &self.commit_hash)
    }

    fn create_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("timestamp".to_string(), Value::from(self.timestamp));
        attributes
    }
}

impl EdgeRecord for FileMethod {
    const LABEL: EdgeLabel = EdgeLabel::Method;
    const FROM: NodeLabel = NodeLabel::File;
    const TO: NodeLabel = NodeLabel::Method;

    fn endpoints(&self) -> (&str, &str) {
        (&self.file_hash, &self.method_hash)
    }
}

impl EdgeRecord for CommitFile {
    const LABEL: EdgeLabel = EdgeLabel::UpdateFile;
    const FROM: NodeLabel = NodeLabel::Commit;
    const TO: NodeLabel = NodeLabel::File;

    fn endpoints(&self) -> (&str, &str) {
        (&self.commit_hash, &self.file_hash)
    }

    fn create_attributes(&self) -> Map<String, Value> {
        self.attributes.clone()
    }
}

impl EdgeRecord for CommitMethod {
    const LABEL: EdgeLabel = EdgeLabel::UpdateMethod;
    const FROM: NodeLabel = NodeLabel::Commit;
    const TO: NodeLabel = NodeLabel::Method;

    fn endpoints(&self) -> (&str, &str) {
        (&self.commit_hash, &self.method_hash)
    }

    fn create_attributes(&self) -> Map<String, Value> {
        self.attributes.clone()
    }
}

impl EdgeRecord for FiletypeFile {
    const LABEL: EdgeLabel = EdgeLabel::FileType;
    const FROM: NodeLabel = NodeLabel::Filetype;
    const TO: NodeLabel = NodeLabel::File;

    fn endpoints(&self) -> (&str, &str) {
        (&self.filetype_hash, &self.file_hash)
    }
}

impl EdgeRecord for BlameFile {
    const LABEL: EdgeLabel = EdgeLabel::GitBlame;
    const FROM: NodeLabel = NodeLabel::Blame;
    const TO: NodeLabel = NodeLabel::File;

    fn endpoints(&self) -> (&str, &str) {
        (&self.blame_hash, &self.file_hash)
    }
}
