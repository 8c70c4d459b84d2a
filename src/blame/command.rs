//! Line authorship via `git blame`
//!
//! Runs `git blame --line-porcelain` as a subprocess in the repository working
//! copy and reduces its output to one author identifier per source line.

use anyhow::{bail, Context, Result};
use git2::Repository;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Source of per-line authorship for files in a repository.
///
/// Returns one line per source line, each starting with the author
/// identifier followed by optional whitespace-separated extra fields.
pub trait AuthorshipSource: Send + Sync {
    fn authorship_lines(&self, file_path: &str) -> Result<Vec<String>>;
}

/// Default per-file timeout for the blame command
pub const DEFAULT_BLAME_TIMEOUT_SECS: u64 = 60;

/// `git blame` subprocess runner
#[derive(Debug, Clone)]
pub struct GitBlameCommand {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitBlameCommand {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    /// Locate the working copy containing `path`.
    pub fn discover(path: &Path, timeout: Duration) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Failed to open git repository at {:?}", path))?;
        let workdir = repo
            .workdir()
            .context("Repository has no working directory (bare repo?)")?
            .to_path_buf();
        debug!("Blaming files in {:?}", workdir);
        Ok(Self::new(workdir, timeout))
    }

    fn spawn(&self, file_path: &str) -> Result<Child> {
        Command::new("git")
            .args(["blame", "-w", "-M", "-C", "--line-porcelain", "--", file_path])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to run git blame")
    }
}

impl AuthorshipSource for GitBlameCommand {
    fn authorship_lines(&self, file_path: &str) -> Result<Vec<String>> {
        let child = self.spawn(file_path)?;
        let stdout = wait_with_timeout(child, self.timeout)
            .with_context(|| format!("git blame {}", file_path))?;
        let text = String::from_utf8(stdout)
            .with_context(|| format!("git blame output for {} is not text", file_path))?;
        Ok(porcelain_authors(&text))
    }
}

/// Extract the author of every line from `--line-porcelain` output.
///
/// Each blamed line repeats its full header, so there is exactly one
/// `author-mail <...>` entry per source line. Addresses are lowercased to
/// match Developer keys.
pub fn porcelain_authors(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.strip_prefix("author-mail "))
        .map(|mail| {
            mail.trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_lowercase()
        })
        .filter(|mail| !mail.is_empty())
        .collect()
}

/// Wait for `child`, killing it once `timeout` has elapsed.
///
/// Stdout is drained on a helper thread so a large output cannot fill the
/// pipe and stall the child.
fn wait_with_timeout(mut child: Child, timeout: Duration) -> Result<Vec<u8>> {
    let reader = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            buf
        })
    });

    let started = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None if started.elapsed() > timeout => {
                let _ = child.kill();
                let _ = child.wait();
                warn!("git blame timed out after {}s", timeout.as_secs());
                bail!("timed out after {}s", timeout.as_secs());
            }
            None => thread::sleep(Duration::from_millis(20)),
        }
    };

    let stdout = reader
        .map(|handle| handle.join().unwrap_or_default())
        .unwrap_or_default();

    if !status.success() {
        bail!("exited with {}", status);
    }
    Ok(stdout)
}
