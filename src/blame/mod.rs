//! Per-file line authorship
//!
//! For every file, asks an [`AuthorshipSource`] who last touched each line
//! and aggregates that into a developer → line-count histogram. Blame is
//! best-effort metadata: a file whose authorship cannot be read still gets a
//! Blame node, with an empty histogram.

pub mod command;

pub use command::{AuthorshipSource, GitBlameCommand, DEFAULT_BLAME_TIMEOUT_SECS};

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::models::{AuthorLines, Blame, BlameFile, File};

/// Blame nodes and their `GitBlame` links for a set of files
#[derive(Debug, Default)]
pub struct BlameOutput {
    pub blames: Vec<Blame>,
    pub links: Vec<BlameFile>,
    /// Files whose authorship could not be read
    pub empty: usize,
}

/// Computes Blame records on a bounded worker pool
pub struct BlameEngine {
    source: Arc<dyn AuthorshipSource>,
    workers: usize,
}

impl BlameEngine {
    pub fn new(source: Arc<dyn AuthorshipSource>, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
        }
    }

    /// Blame every file. Output order follows `files`.
    pub fn blame_files(&self, files: &[File]) -> BlameOutput {
        self.blame_files_with_progress(files, || {})
    }

    /// Like [`blame_files`](Self::blame_files), calling `tick` once per file.
    pub fn blame_files_with_progress<F>(&self, files: &[File], tick: F) -> BlameOutput
    where
        F: Fn() + Send + Sync,
    {
        if files.is_empty() {
            return BlameOutput::default();
        }

        let job = |file: &File| {
            let (blame, readable) = self.blame_file(file);
            tick();
            (file.hash.clone(), blame, readable)
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build();
        let results: Vec<(String, Blame, bool)> = match pool {
            Ok(pool) => pool.install(|| files.par_iter().map(job).collect()),
            Err(e) => {
                debug!("Blame pool unavailable ({}), running sequentially", e);
                files.iter().map(job).collect()
            }
        };

        let mut output = BlameOutput::default();
        for (file_hash, blame, readable) in results {
            if !readable {
                output.empty += 1;
            }
            output.links.push(BlameFile {
                blame_hash: blame.hash.clone(),
                file_hash,
            });
            output.blames.push(blame);
        }
        output
    }

    /// Blame one file. The flag is false when authorship could not be read.
    fn blame_file(&self, file: &File) -> (Blame, bool) {
        match self.source.authorship_lines(&file.path) {
            Ok(lines) => (Blame::for_file(file, histogram(&lines)), true),
            Err(e) => {
                debug!("No blame for {}: {:#}", file.path, e);
                (Blame::for_file(file, Vec::new()), false)
            }
        }
    }
}

/// Count lines per author identifier (the first field of each line).
///
/// Sorted by descending count, ties by identifier.
pub fn histogram<S: AsRef<str>>(lines: &[S]) -> Vec<AuthorLines> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for line in lines {
        if let Some(developer) = line.as_ref().split_whitespace().next() {
            *counts.entry(developer).or_insert(0) += 1;
        }
    }

    let mut histogram: Vec<AuthorLines> = counts
        .into_iter()
        .map(|(developer, lines)| AuthorLines {
            developer: developer.to_string(),
            lines,
        })
        .collect();
    histogram.sort_by(|a, b| {
        b.lines
            .cmp(&a.lines)
            .then_with(|| a.developer.cmp(&b.developer))
    });
    histogram
}
