//! Stats command - node and edge counts of the indexed graph

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use crate::config::IndexConfig;
use crate::graph::{EdgeLabel, GraphStore, NodeLabel};

/// Show graph statistics
pub fn run(path: &Path) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    let config = IndexConfig::load(&repo_path);
    let db_path = config.graph_path();
    if !db_path.exists() {
        anyhow::bail!(
            "No index found. Run {} first.",
            style("repograph index").cyan()
        );
    }

    let graph = GraphStore::new(&db_path).with_context(|| "Failed to open graph database")?;

    println!("\n{} Graph Statistics\n", style("📊").bold());
    println!("  {}", style("Nodes").bold());
    for label in NodeLabel::ALL {
        println!(
            "    {:<12} {}",
            style(label.as_str()).cyan(),
            style(graph.count_nodes(label)).bold()
        );
    }

    println!("\n  {}", style("Edges").bold());
    for label in EdgeLabel::ALL {
        println!(
            "    {:<12} {}",
            style(label.as_str()).cyan(),
            style(graph.count_edges(label)).bold()
        );
    }

    println!(
        "\n  {}: {} nodes, {} edges, {} indexes",
        style("Total").bold(),
        graph.node_count(),
        graph.edge_count(),
        graph.indexes().len()
    );

    Ok(())
}
