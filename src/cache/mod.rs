//! Snapshot of mined records
//!
//! A [`RecordSet`] holds every collection the indexer consumes. Persisting it
//! lets a later run rebuild the graph without mining the repository again.

pub mod paths;

pub use paths::{get_graph_db_path, get_records_path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::models::{
    AuthorCommit, Branch, BranchCommit, Commit, CommitFile, CommitMethod, Developer, File,
    FileMethod, Method, ParentCommit,
};

/// Every record collection produced by mining one repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    pub developers: Vec<Developer>,
    pub commits: Vec<Commit>,
    pub branches: Vec<Branch>,
    pub branches_commits: Vec<BranchCommit>,
    pub files: Vec<File>,
    pub methods: Vec<Method>,
    pub file_methods: Vec<FileMethod>,
    pub parents: Vec<ParentCommit>,
    pub dev_commits: Vec<AuthorCommit>,
    pub commit_methods: Vec<CommitMethod>,
    pub commit_files: Vec<CommitFile>,
}

impl RecordSet {
    /// Load a snapshot. Missing collections load as empty.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read record snapshot {}", path.display()))?;
        let records: RecordSet = serde_json::from_str(&data)
            .with_context(|| format!("Invalid record snapshot {}", path.display()))?;
        debug!("Loaded snapshot {}: {}", path.display(), records.summary());
        Ok(records)
    }

    /// Write the snapshot, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write record snapshot {}", path.display()))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.developers.is_empty()
            && self.commits.is_empty()
            && self.branches.is_empty()
            && self.files.is_empty()
            && self.methods.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} developers, {} commits, {} branches, {} files, {} methods",
            self.developers.len(),
            self.commits.len(),
            self.branches.len(),
            self.files.len(),
            self.methods.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_snapshot_save_and_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("records.json");

        let records = RecordSet {
            developers: vec![Developer::new("Alice", "alice@x.com")],
            commits: vec![Commit::new("abc", "p", 10, "init")],
            files: vec![File::new("src/lib.rs", "p")],
            ..Default::default()
        };
        records.save(&path)?;

        let loaded = RecordSet::load(&path)?;
        assert_eq!(loaded, records);
        Ok(())
    }

    #[test]
    fn test_missing_keys_load_empty() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("records.json");
        fs::write(
            &path,
            r#"{"branches":[{"hash":"b","name":"main","project_id":"p"}]}"#,
        )?;

        let loaded = RecordSet::load(&path)?;
        assert_eq!(loaded.branches.len(), 1);
        assert!(loaded.commits.is_empty());
        assert!(loaded.commit_files.is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_snapshot_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("records.json");
        fs::write(&path, "not json").expect("write");
        assert!(RecordSet::load(&path).is_err());
        assert!(RecordSet::load(&dir.path().join("missing.json")).is_err());
    }
}
