//! Index command - build the graph from a record snapshot

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::blame::GitBlameCommand;
use crate::cache;
use crate::config::IndexConfig;
use crate::graph::GraphStore;
use crate::pipeline::{IndexCoordinator, IndexStats, Progress, Stage};

/// Flags that override the loaded configuration
#[derive(Debug, Default)]
pub struct IndexArgs {
    pub records: Option<PathBuf>,
    pub project_id: Option<String>,
    pub no_blame: bool,
    pub batch_size: Option<usize>,
    pub workers: Option<usize>,
}

/// Run the index command
pub fn run(path: &Path, args: IndexArgs) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    let config = resolve_config(&repo_path, &args);
    config.validate()?;

    let records_path = args
        .records
        .clone()
        .unwrap_or_else(|| cache::get_records_path(&repo_path));
    if !records_path.exists() {
        anyhow::bail!(
            "No record snapshot at {}. Pass one with {}.",
            records_path.display(),
            style("--records <file>").cyan()
        );
    }

    println!(
        "\n{} Indexing {} as {}\n",
        style("▶").bold(),
        style(repo_path.display()).cyan(),
        style(config.project_id()).bold()
    );

    let graph_path = config.graph_path();
    let store = Arc::new(
        GraphStore::new(&graph_path)
            .with_context(|| format!("Failed to open graph at {}", graph_path.display()))?,
    );

    let mut coordinator = IndexCoordinator::new(store.clone(), config.clone());
    if config.blame_enabled {
        match GitBlameCommand::discover(&repo_path, config.blame_timeout()) {
            Ok(command) => coordinator = coordinator.with_authorship(Arc::new(command)),
            Err(e) => warn!("Blame skipped: {:#}", e),
        }
    }

    let progress = CliProgress::new();
    let stats = coordinator.run_from_snapshot(&records_path, &progress)?;
    store.save().context("Failed to persist graph")?;

    print_stats(&stats);
    println!(
        "\n{} Graph saved to {}",
        style("✓").green(),
        style(graph_path.display()).cyan()
    );
    Ok(())
}

/// Config file and environment first, then flags
fn resolve_config(repo_path: &Path, args: &IndexArgs) -> IndexConfig {
    let mut config = IndexConfig::load(repo_path);
    if let Some(n) = args.batch_size {
        config.batch_size = n;
    }
    if let Some(n) = args.workers {
        config.blame_workers = n;
    }
    if let Some(id) = &args.project_id {
        config.project_id = Some(id.clone());
    }
    if args.no_blame {
        config.blame_enabled = false;
    }
    config
}

fn print_stats(stats: &IndexStats) {
    println!("\n{} Index run {}\n", style("📊").bold(), style(&stats.run_id).dim());
    for report in &stats.reports {
        let status = if report.is_clean() {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {:<14} {:>7} records  {:>7} created  {} batches",
            status,
            style(&report.label).cyan(),
            report.records,
            report.created,
            report.batches
        );
        if !report.is_clean() {
            println!(
                "      {}",
                style(format!("{} batches rejected", report.failed_batches)).red()
            );
        }
    }
    println!("\n  {}", stats.summary());
}

/// Spinner for stages, bar for blame
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        bar.set_style(style);
        Self { bar }
    }
}

impl Progress for CliProgress {
    fn stage(&self, stage: Stage) {
        self.bar.set_message(format!("{}...", stage));
    }

    fn blame_started(&self, files: usize) {
        self.bar.set_length(files as u64);
        self.bar.set_position(0);
        self.bar.set_message("Blaming files...");
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn file_blamed(&self) {
        self.bar.inc(1);
    }

    fn blame_finished(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("repograph.toml"),
            "batch_size = 10\nblame_workers = 3\n",
        )
        .unwrap();

        let args = IndexArgs {
            batch_size: Some(40),
            no_blame: true,
            ..Default::default()
        };
        let config = resolve_config(dir.path(), &args);
        assert_eq!(config.batch_size, 40);
        assert_eq!(config.blame_workers, 3);
        assert!(!config.blame_enabled);
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let dir = tempdir().unwrap();
        let args = IndexArgs {
            records: Some(dir.path().join("missing.json")),
            ..Default::default()
        };
        let err = run(dir.path(), args).unwrap_err();
        assert!(err.to_string().contains("No record snapshot"));
    }
}
