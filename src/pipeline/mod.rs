//! Indexing pipeline
//!
//! Runs one indexing pass over a [`RecordSet`] in five stages:
//! 1. Dedup every collection, derive file types
//! 2. Upsert nodes
//! 3. Compute and upsert blame
//! 4. Upsert edges (every endpoint kind is in the store by now)
//! 5. Complete
//!
//! A run is not resumable part-way through. Because every write is a merge,
//! re-running the same records converges to the same graph.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::blame::{AuthorshipSource, BlameEngine, BlameOutput};
use crate::cache::RecordSet;
use crate::config::IndexConfig;
use crate::dedup::{dedup_by_key, dedup_by_value};
use crate::graph::{GraphBackend, StoreResult};
use crate::models::{Filetype, FiletypeFile};
use crate::upsert::{UpsertEngine, UpsertReport};

/// Stages of an indexing run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dedup,
    Nodes,
    Blame,
    Edges,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Dedup => "dedup",
            Stage::Nodes => "nodes",
            Stage::Blame => "blame",
            Stage::Edges => "edges",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Hooks for reporting run progress. All methods default to no-ops.
pub trait Progress: Send + Sync {
    fn stage(&self, _stage: Stage) {}
    fn blame_started(&self, _files: usize) {}
    fn file_blamed(&self) {}
    fn blame_finished(&self) {}
}

/// Progress sink that ignores everything
pub struct NoProgress;

impl Progress for NoProgress {}

/// Statistics from one indexing run
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// Run label from the config; records keep their own project ids
    pub project_id: String,
    /// One report per node and edge kind, in upsert order
    pub reports: Vec<UpsertReport>,
    pub blamed_files: usize,
    /// Files that got an empty blame because authorship was unreadable
    pub empty_blames: usize,
    pub stage_timings: Vec<(Stage, Duration)>,
    pub duration: Duration,
}

impl IndexStats {
    fn new(project_id: String) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            project_id,
            reports: Vec::new(),
            blamed_files: 0,
            empty_blames: 0,
            stage_timings: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn report(&self, label: &str) -> Option<&UpsertReport> {
        self.reports.iter().find(|r| r.label == label)
    }

    pub fn failed_batches(&self) -> usize {
        self.reports.iter().map(|r| r.failed_batches).sum()
    }

    pub fn created(&self) -> usize {
        self.reports.iter().map(|r| r.created).sum()
    }

    /// True when no batch was rejected by the store
    pub fn is_clean(&self) -> bool {
        self.failed_batches() == 0
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} created", self.created()),
            format!("{} files blamed", self.blamed_files),
        ];
        if self.empty_blames > 0 {
            parts.push(format!("{} without authorship", self.empty_blames));
        }
        if self.failed_batches() > 0 {
            parts.push(format!("{} failed batches", self.failed_batches()));
        }
        parts.push(format!("{:.2}s", self.duration.as_secs_f64()));
        parts.join(", ")
    }
}

/// Drives the five indexing stages against a graph backend
pub struct IndexCoordinator {
    backend: Arc<dyn GraphBackend>,
    config: IndexConfig,
    authorship: Option<Arc<dyn AuthorshipSource>>,
}

impl IndexCoordinator {
    pub fn new(backend: Arc<dyn GraphBackend>, config: IndexConfig) -> Self {
        Self {
            backend,
            config,
            authorship: None,
        }
    }

    /// Source of per-line authorship. Without one the blame stage is skipped.
    pub fn with_authorship(mut self, source: Arc<dyn AuthorshipSource>) -> Self {
        self.authorship = Some(source);
        self
    }

    /// Load a record snapshot and index it.
    pub fn run_from_snapshot(&self, path: &Path, progress: &dyn Progress) -> Result<IndexStats> {
        let records = RecordSet::load(path)?;
        info!("Indexing from snapshot {}", path.display());
        self.run(records, progress)
    }

    /// Run every stage over `records`.
    ///
    /// Fails only when the store is unreachable; rejected batches are
    /// counted in the returned stats.
    pub fn run(&self, records: RecordSet, progress: &dyn Progress) -> Result<IndexStats> {
        self.config.validate()?;
        let batch_size = self.config.batch_size()?;
        self.backend.ping().context("Graph store is unavailable")?;

        let run_start = Instant::now();
        let mut stats = IndexStats::new(self.config.project_id());
        info!("Index run {} for project {}", stats.run_id, stats.project_id);
        if records.is_empty() {
            warn!("No developers, commits, branches, files or methods to index");
        }

        let stage_start = self.begin(Stage::Dedup, progress);
        let records = Deduped::from(records);
        info!(
            "Deduplicated to {} developers, {} commits, {} branches, {} files, {} methods",
            records.set.developers.len(),
            records.set.commits.len(),
            records.set.branches.len(),
            records.set.files.len(),
            records.set.methods.len()
        );
        self.end(Stage::Dedup, stage_start, &mut stats);

        let stage_start = self.begin(Stage::Nodes, progress);
        self.upsert_nodes(&records, batch_size, &mut stats)
            .context("Graph store failed during node upsert")?;
        self.end(Stage::Nodes, stage_start, &mut stats);

        let stage_start = self.begin(Stage::Blame, progress);
        let blame = self.blame(&records, progress);
        stats.blamed_files = blame.blames.len();
        stats.empty_blames = blame.empty;
        let engine = UpsertEngine::new(self.backend.as_ref());
        stats.reports.push(
            engine
                .upsert_nodes(&blame.blames, batch_size)
                .context("Graph store failed during blame upsert")?,
        );
        self.end(Stage::Blame, stage_start, &mut stats);

        let stage_start = self.begin(Stage::Edges, progress);
        self.upsert_edges(&records, &blame, batch_size, &mut stats)
            .context("Graph store failed during edge upsert")?;
        self.end(Stage::Edges, stage_start, &mut stats);

        progress.stage(Stage::Complete);
        stats.duration = run_start.elapsed();
        if stats.is_clean() {
            info!("Index run complete: {}", stats.summary());
        } else {
            warn!(
                "Index run complete with {} failed batches: {}",
                stats.failed_batches(),
                stats.summary()
            );
        }
        Ok(stats)
    }

    fn begin(&self, stage: Stage, progress: &dyn Progress) -> Instant {
        progress.stage(stage);
        info!("Stage {} started", stage);
        Instant::now()
    }

    fn end(&self, stage: Stage, started: Instant, stats: &mut IndexStats) {
        let elapsed = started.elapsed();
        info!("Stage {} finished in {:?}", stage, elapsed);
        stats.stage_timings.push((stage, elapsed));
    }

    fn upsert_nodes(
        &self,
        records: &Deduped,
        batch_size: NonZeroUsize,
        stats: &mut IndexStats,
    ) -> StoreResult<()> {
        let engine = UpsertEngine::new(self.backend.as_ref());
        let set = &records.set;

        stats.reports.push(engine.upsert_nodes(&set.developers, batch_size)?);
        stats.reports.push(engine.upsert_nodes(&set.commits, batch_size)?);
        stats.reports.push(engine.upsert_nodes(&set.branches, batch_size)?);
        stats.reports.push(engine.upsert_nodes(&set.files, batch_size)?);
        stats.reports.push(engine.upsert_nodes(&records.filetypes, batch_size)?);
        stats.reports.push(engine.upsert_nodes(&set.methods, batch_size)?);
        Ok(())
    }

    fn blame(&self, records: &Deduped, progress: &dyn Progress) -> BlameOutput {
        let source = match (&self.authorship, self.config.blame_enabled) {
            (Some(source), true) => Arc::clone(source),
            _ => {
                debug!("Blame disabled, skipping");
                return BlameOutput::default();
            }
        };

        let files = &records.set.files;
        progress.blame_started(files.len());
        let engine = BlameEngine::new(source, self.config.blame_workers);
        let output = engine.blame_files_with_progress(files, || progress.file_blamed());
        progress.blame_finished();

        if output.empty > 0 {
            debug!("{} of {} files have no authorship", output.empty, files.len());
        }
        output
    }

    fn upsert_edges(
        &self,
        records: &Deduped,
        blame: &BlameOutput,
        batch_size: NonZeroUsize,
        stats: &mut IndexStats,
    ) -> StoreResult<()> {
        let engine = UpsertEngine::new(self.backend.as_ref());
        let set = &records.set;

        stats.reports.push(engine.upsert_edges(&set.parents, batch_size)?);
        stats.reports.push(engine.upsert_edges(&set.branches_commits, batch_size)?);
        stats.reports.push(engine.upsert_edges(&set.dev_commits, batch_size)?);
        stats.reports.push(engine.upsert_edges(&records.filetype_files, batch_size)?);
        stats.reports.push(engine.upsert_edges(&set.file_methods, batch_size)?);
        stats.reports.push(engine.upsert_edges(&set.commit_methods, batch_size)?);
        stats.reports.push(engine.upsert_edges(&set.commit_files, batch_size)?);
        stats.reports.push(engine.upsert_edges(&blame.links, batch_size)?);
        Ok(())
    }
}

/// Deduplicated records plus the file types derived from them
struct Deduped {
    set: RecordSet,
    filetypes: Vec<Filetype>,
    filetype_files: Vec<FiletypeFile>,
}

impl From<RecordSet> for Deduped {
    fn from(records: RecordSet) -> Self {
        let set = RecordSet {
            developers: dedup_by_key(records.developers),
            commits: dedup_by_key(records.commits),
            branches: dedup_by_key(records.branches),
            files: dedup_by_key(records.files),
            methods: dedup_by_key(records.methods),
            parents: dedup_by_value(records.parents),
            branches_commits: dedup_by_value(records.branches_commits),
            file_methods: dedup_by_value(records.file_methods),
            dev_commits: records.dev_commits,
            commit_methods: records.commit_methods,
            commit_files: records.commit_files,
        };

        let mut filetypes = Vec::with_capacity(set.files.len());
        let mut filetype_files = Vec::with_capacity(set.files.len());
        for file in &set.files {
            let filetype = Filetype::of(file);
            filetype_files.push(FiletypeFile {
                filetype_hash: filetype.hash.clone(),
                file_hash: file.hash.clone(),
            });
            filetypes.push(filetype);
        }

        Self {
            set,
            filetypes: dedup_by_key(filetypes),
            filetype_files,
        }
    }
}
