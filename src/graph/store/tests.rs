use super::*;
use serde_json::json;
use tempfile::tempdir;

fn file(key: &str) -> GraphNode {
    GraphNode::new(NodeLabel::File, key).with_property("project_id", "p")
}

fn commit(key: &str, timestamp: i64) -> GraphNode {
    GraphNode::new(NodeLabel::Commit, key).with_property("timestamp", timestamp)
}

fn edge(label: EdgeLabel, from: (NodeLabel, &str), to: (NodeLabel, &str)) -> EdgeMerge {
    EdgeMerge::new(label, NodeRef::new(from.0, from.1), NodeRef::new(to.0, to.1))
}

#[test]
fn test_merge_nodes_creates_once() {
    let store = GraphStore::in_memory();

    let created = store
        .merge_nodes(&[file("a"), file("b"), file("a")])
        .expect("merge nodes");
    assert_eq!(created, 2);

    let again = store.merge_nodes(&[file("a")]).expect("merge nodes again");
    assert_eq!(again, 0);
    assert_eq!(store.count_nodes(NodeLabel::File), 2);
}

#[test]
fn test_merge_nodes_keeps_first_attributes() {
    let store = GraphStore::in_memory();

    store
        .merge_nodes(&[file("a").with_property("name", "first")])
        .expect("first merge");
    store
        .merge_nodes(&[file("a").with_property("name", "second")])
        .expect("second merge");

    let node = store.get_node(NodeLabel::File, "a").expect("node exists");
    assert_eq!(node.get_str("name"), Some("first"));
}

#[test]
fn test_same_key_different_labels_are_distinct() {
    let store = GraphStore::in_memory();
    store
        .merge_nodes(&[file("x"), commit("x", 1)])
        .expect("merge nodes");
    assert_eq!(store.node_count(), 2);
}

#[test]
fn test_malformed_batch_is_rejected_whole() {
    let store = GraphStore::in_memory();

    let err = store
        .merge_nodes(&[file("ok"), file("  ")])
        .expect_err("empty key must be rejected");
    assert!(!err.is_fatal());
    assert_eq!(store.node_count(), 0, "nothing from a rejected batch is written");
}

#[test]
fn test_edge_before_endpoints_creates_nothing() {
    let store = GraphStore::in_memory();
    let parent = edge(
        EdgeLabel::Parent,
        (NodeLabel::Commit, "c1"),
        (NodeLabel::Commit, "c2"),
    );

    assert_eq!(store.merge_edges(&[parent.clone()]).expect("merge edge"), 0);

    store
        .merge_nodes(&[commit("c1", 1), commit("c2", 2)])
        .expect("merge nodes");
    assert_eq!(store.merge_edges(&[parent.clone()]).expect("merge edge"), 1);
    assert_eq!(store.merge_edges(&[parent]).expect("merge edge"), 0);
    assert_eq!(store.count_edges(EdgeLabel::Parent), 1);
}

#[test]
fn test_edge_attributes_are_create_only() {
    let store = GraphStore::in_memory();
    store
        .merge_nodes(&[commit("c1", 1), file("f")])
        .expect("merge nodes");

    let mut first = serde_json::Map::new();
    first.insert("added".to_string(), json!(3));
    let mut second = serde_json::Map::new();
    second.insert("added".to_string(), json!(9));

    let base = edge(
        EdgeLabel::UpdateFile,
        (NodeLabel::Commit, "c1"),
        (NodeLabel::File, "f"),
    );
    store
        .merge_edges(&[base.clone().with_attributes(first)])
        .expect("first edge merge");
    store
        .merge_edges(&[base.with_attributes(second)])
        .expect("second edge merge");

    let edges = store.get_edges(EdgeLabel::UpdateFile);
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].2.properties.get("added"), Some(&json!(3)));
}

#[test]
fn test_different_edge_labels_between_same_pair() {
    let store = GraphStore::in_memory();
    store
        .merge_nodes(&[commit("c1", 1), commit("c2", 2)])
        .expect("merge nodes");

    let parent = edge(
        EdgeLabel::Parent,
        (NodeLabel::Commit, "c1"),
        (NodeLabel::Commit, "c2"),
    );
    let mut other = parent.clone();
    other.label = EdgeLabel::BranchCommit;

    assert_eq!(store.merge_edges(&[parent, other]).expect("merge"), 2);
}

#[test]
fn test_ensure_index_is_idempotent() {
    let store = GraphStore::in_memory();

    assert!(store.ensure_index(NodeLabel::File, "hash").expect("index"));
    assert!(!store.ensure_index(NodeLabel::File, "hash").expect("index"));
    assert!(store.has_index(NodeLabel::File, "hash"));
    assert!(store.ensure_index(NodeLabel::File, "").is_err());
}

#[test]
fn test_method_change_history_ordered_by_commit_time() {
    let store = GraphStore::in_memory();
    store
        .merge_nodes(&[
            commit("late", 200),
            commit("early", 100),
            GraphNode::new(NodeLabel::Method, "m"),
            file("f"),
        ])
        .expect("merge nodes");

    store
        .merge_edges(&[
            edge(
                EdgeLabel::UpdateMethod,
                (NodeLabel::Commit, "late"),
                (NodeLabel::Method, "m"),
            ),
            edge(
                EdgeLabel::UpdateMethod,
                (NodeLabel::Commit, "early"),
                (NodeLabel::Method, "m"),
            ),
            edge(
                EdgeLabel::Method,
                (NodeLabel::File, "f"),
                (NodeLabel::Method, "m"),
            ),
        ])
        .expect("merge edges");

    let history = store.method_change_history("m");
    let keys: Vec<&str> = history.iter().map(|(c, _)| c.key.as_str()).collect();
    assert_eq!(keys, vec!["early", "late"]);

    let methods = store.file_methods("f");
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].key, "m");
    assert!(store.file_methods("missing").is_empty());
}

#[test]
fn test_stats_counts_every_label() {
    let store = GraphStore::in_memory();
    store.merge_nodes(&[file("a"), file("b")]).expect("merge");

    let stats = store.stats();
    assert_eq!(stats["nodes.File"], 2);
    assert_eq!(stats["nodes.Blame"], 0);
    assert_eq!(stats["edges.GitBlame"], 0);
    assert_eq!(stats["total_nodes"], 2);
}

#[test]
fn test_persistence() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("graph");

    {
        let store = GraphStore::new(&path).expect("create graph store");
        store
            .merge_nodes(&[commit("c1", 1), commit("c2", 2)])
            .expect("merge nodes");
        store
            .merge_edges(&[edge(
                EdgeLabel::Parent,
                (NodeLabel::Commit, "c1"),
                (NodeLabel::Commit, "c2"),
            )])
            .expect("merge edges");
        store.ensure_index(NodeLabel::Commit, "hash").expect("index");
        store.save().expect("save graph store");
        drop(store);
    }

    // Give the OS a moment to release the file lock
    std::thread::sleep(std::time::Duration::from_millis(50));

    {
        let store = GraphStore::new(&path).expect("reload graph store");
        assert_eq!(store.count_nodes(NodeLabel::Commit), 2);
        assert_eq!(store.count_edges(EdgeLabel::Parent), 1);
        assert!(store.has_index(NodeLabel::Commit, "hash"));

        // Reloaded keys still merge
        assert_eq!(store.merge_nodes(&[commit("c1", 1)]).expect("merge"), 0);
    }
}
