//! End-to-end indexing through the library API
//!
//! Runs the coordinator against a persisted store with a canned authorship
//! source, so no git binary is needed.

use anyhow::{anyhow, Result};
use serde_json::{json, Map};
use std::sync::Arc;
use tempfile::tempdir;

use repograph::blame::AuthorshipSource;
use repograph::graph::{EdgeLabel, GraphStore, NodeLabel};
use repograph::models::{
    AuthorCommit, Branch, BranchCommit, Commit, CommitFile, CommitMethod, Developer, File,
    FileMethod, Method, ParentCommit,
};
use repograph::pipeline::NoProgress;
use repograph::{IndexConfig, IndexCoordinator, RecordSet};

/// Every file is authored by alice except `README`, which has no text output
struct CannedAuthorship;

impl AuthorshipSource for CannedAuthorship {
    fn authorship_lines(&self, file_path: &str) -> Result<Vec<String>> {
        if file_path == "README" {
            return Err(anyhow!("no output"));
        }
        Ok(vec![
            "alice@example.com 1".into(),
            "bob@example.com 2".into(),
            "alice@example.com 3".into(),
        ])
    }
}

fn mined_records(project: &str) -> RecordSet {
    let alice = Developer::new("Alice", "alice@example.com");
    let bob = Developer::new("Bob", "bob@example.com");
    let commits: Vec<Commit> = (0..5)
        .map(|i| Commit::new(&format!("c{}", i), project, 1_000 + i, &format!("commit {}", i)))
        .collect();
    let main = Branch::new("main", project);
    let files: Vec<File> = (0..230)
        .map(|i| File::new(&format!("src/mod{}.rs", i), project))
        .chain(std::iter::once(File::new("README", project)))
        .collect();
    let parse = Method::new("parse", "parse(input)", "src/mod0.rs", project);

    let parents = commits
        .windows(2)
        .map(|w| ParentCommit {
            parent_hash: w[0].hash.clone(),
            child_hash: w[1].hash.clone(),
        })
        .collect();
    let branches_commits = commits
        .iter()
        .map(|c| BranchCommit {
            branch_hash: main.hash.clone(),
            commit_hash: c.hash.clone(),
        })
        .collect();
    let dev_commits = commits
        .iter()
        .enumerate()
        .map(|(i, c)| AuthorCommit {
            author_hash: (if i % 2 == 0 { &alice } else { &bob }).hash.clone(),
            commit_hash: c.hash.clone(),
            timestamp: c.timestamp,
        })
        .collect();

    let mut first_change = Map::new();
    first_change.insert("complexity".into(), json!(3));
    let mut second_change = Map::new();
    second_change.insert("complexity".into(), json!(5));

    let mut file_change = Map::new();
    file_change.insert("added_lines".into(), json!(12));
    file_change.insert("change_type".into(), json!("ADD"));

    RecordSet {
        commit_methods: vec![
            CommitMethod {
                commit_hash: commits[3].hash.clone(),
                method_hash: parse.hash.clone(),
                attributes: second_change,
            },
            CommitMethod {
                commit_hash: commits[1].hash.clone(),
                method_hash: parse.hash.clone(),
                attributes: first_change,
            },
        ],
        commit_files: vec![CommitFile {
            commit_hash: commits[0].hash.clone(),
            file_hash: files[0].hash.clone(),
            attributes: file_change,
        }],
        file_methods: vec![
            FileMethod {
                file_hash: files[0].hash.clone(),
                method_hash: parse.hash.clone(),
            },
            // Mined twice
            FileMethod {
                file_hash: files[0].hash.clone(),
                method_hash: parse.hash.clone(),
            },
        ],
        // Alice shows up under two spellings of the same address
        developers: vec![alice, bob, Developer::new("alice", "Alice@Example.com")],
        parents,
        branches_commits,
        dev_commits,
        commits,
        branches: vec![main],
        files,
        methods: vec![parse],
    }
}

fn coordinator(store: Arc<GraphStore>, batch_size: usize) -> IndexCoordinator {
    let config = IndexConfig {
        project_id: Some("demo".into()),
        batch_size,
        blame_workers: 4,
        ..Default::default()
    };
    IndexCoordinator::new(store, config).with_authorship(Arc::new(CannedAuthorship))
}

#[test]
fn test_index_from_snapshot_and_reopen() -> Result<()> {
    let dir = tempdir()?;
    let snapshot = dir.path().join("cache").join("records.json");
    mined_records("demo").save(&snapshot)?;

    let graph_path = dir.path().join("graph");
    {
        let store = Arc::new(GraphStore::new(&graph_path)?);
        let stats = coordinator(store.clone(), 100).run_from_snapshot(&snapshot, &NoProgress)?;
        assert!(stats.is_clean());
        assert_eq!(stats.report("File").map(|r| r.batches), Some(3));
        store.save()?;
    }

    let store = GraphStore::new(&graph_path)?;
    assert_eq!(store.count_nodes(NodeLabel::Developer), 2);
    assert_eq!(store.count_nodes(NodeLabel::Commit), 5);
    assert_eq!(store.count_nodes(NodeLabel::File), 231);
    assert_eq!(store.count_nodes(NodeLabel::Filetype), 2);
    assert_eq!(store.count_nodes(NodeLabel::Blame), 231);
    assert_eq!(store.count_edges(EdgeLabel::Parent), 4);
    assert_eq!(store.count_edges(EdgeLabel::BranchCommit), 5);
    assert_eq!(store.count_edges(EdgeLabel::Author), 5);
    assert_eq!(store.count_edges(EdgeLabel::Method), 1);
    assert_eq!(store.count_edges(EdgeLabel::UpdateMethod), 2);
    assert_eq!(store.count_edges(EdgeLabel::UpdateFile), 1);
    assert_eq!(store.count_edges(EdgeLabel::FileType), 231);
    assert_eq!(store.count_edges(EdgeLabel::GitBlame), 231);
    assert!(store.has_index(NodeLabel::Blame, "project_id"));
    assert!(!store.has_index(NodeLabel::Developer, "project_id"));
    Ok(())
}

#[test]
fn test_reindex_converges() -> Result<()> {
    let store = Arc::new(GraphStore::in_memory());

    coordinator(store.clone(), 100).run(mined_records("demo"), &NoProgress)?;
    let first = store.stats();

    // Different batch size, same records: same graph
    let again = coordinator(store.clone(), 7).run(mined_records("demo"), &NoProgress)?;
    assert_eq!(store.stats(), first);
    assert_eq!(again.created(), 0);
    Ok(())
}

#[test]
fn test_blame_histograms() -> Result<()> {
    let store = Arc::new(GraphStore::in_memory());
    let stats = coordinator(store.clone(), 50).run(mined_records("demo"), &NoProgress)?;
    assert_eq!(stats.empty_blames, 1);

    let blames = store.get_nodes(NodeLabel::Blame);
    let readme = blames
        .iter()
        .find(|b| b.get_str("filename") == Some("README"))
        .expect("README blame");
    assert_eq!(readme.properties.get("blame"), Some(&json!([])));

    let source = blames
        .iter()
        .find(|b| b.get_str("filename") == Some("src/mod0.rs"))
        .expect("source blame");
    assert_eq!(
        source.properties.get("blame"),
        Some(&json!([
            {"developer": "alice@example.com", "lines": 2},
            {"developer": "bob@example.com", "lines": 1},
        ]))
    );
    Ok(())
}

#[test]
fn test_method_history_and_file_methods() -> Result<()> {
    let store = Arc::new(GraphStore::in_memory());
    coordinator(store.clone(), 100).run(mined_records("demo"), &NoProgress)?;

    let file = File::new("src/mod0.rs", "demo");
    let methods = store.file_methods(&file.hash);
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].get_str("name"), Some("parse"));

    let history = store.method_change_history(&methods[0].key);
    let complexities: Vec<_> = history
        .iter()
        .map(|(_, edge)| edge.properties.get("complexity").cloned())
        .collect();
    assert_eq!(complexities, vec![Some(json!(3)), Some(json!(5))]);
    Ok(())
}
