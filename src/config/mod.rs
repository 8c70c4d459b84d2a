//! Indexing configuration
//!
//! Values are resolved in order, later sources winning:
//! 1. Built-in defaults
//! 2. `repograph.toml` in the repository root
//! 3. Environment variables (`REPOGRAPH_*`)
//! 4. CLI flags (applied by the caller)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::blame::DEFAULT_BLAME_TIMEOUT_SECS;
use crate::cache;

/// Config file name looked up in the repository root
pub const CONFIG_FILE_NAME: &str = "repograph.toml";

/// Default size of the blame worker pool
pub const DEFAULT_BLAME_WORKERS: usize = 8;

/// Configuration for one indexing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Repository working copy (never read from the file)
    #[serde(skip)]
    pub repo_path: PathBuf,

    /// Label for the run; defaults to the repository dir name. Records keep
    /// the project id they were mined with.
    pub project_id: Option<String>,

    pub batch_size: usize,
    pub blame_workers: usize,
    pub blame_timeout_secs: u64,
    pub blame_enabled: bool,

    /// Graph database directory; defaults to the per-repository cache dir
    pub graph_path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            project_id: None,
            batch_size: DEFAULT_BATCH_SIZE,
            blame_workers: DEFAULT_BLAME_WORKERS,
            blame_timeout_secs: DEFAULT_BLAME_TIMEOUT_SECS,
            blame_enabled: true,
            graph_path: None,
        }
    }
}

impl IndexConfig {
    /// Defaults for a repository, without reading any file or env var
    pub fn for_repo(repo_path: &Path) -> Self {
        Self {
            repo_path: repo_path.to_path_buf(),
            ..Default::default()
        }
    }

    /// Load config for a repository: file first, then environment overrides.
    ///
    /// A missing file yields defaults. A file that cannot be read or parsed is
    /// reported and ignored.
    pub fn load(repo_path: &Path) -> Self {
        let path = repo_path.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to load {}: {:#}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.repo_path = repo_path.to_path_buf();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).context("invalid TOML")
    }

    /// Apply `REPOGRAPH_*` overrides. Unparseable values are ignored.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring {}={:?}: not a number", name, value);
                    None
                }
            }
        }

        if let Some(n) = parsed("REPOGRAPH_BATCH_SIZE", var("REPOGRAPH_BATCH_SIZE")) {
            self.batch_size = n;
        }
        if let Some(n) = parsed("REPOGRAPH_BLAME_WORKERS", var("REPOGRAPH_BLAME_WORKERS")) {
            self.blame_workers = n;
        }
        if let Some(n) = parsed("REPOGRAPH_BLAME_TIMEOUT", var("REPOGRAPH_BLAME_TIMEOUT")) {
            self.blame_timeout_secs = n;
        }
        if let Some(id) = var("REPOGRAPH_PROJECT_ID").filter(|id| !id.trim().is_empty()) {
            self.project_id = Some(id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be greater than 0");
        }
        if self.blame_workers == 0 {
            bail!("blame_workers must be greater than 0");
        }
        if self.blame_enabled && self.blame_timeout_secs == 0 {
            bail!("blame_timeout_secs must be greater than 0");
        }
        Ok(())
    }

    pub fn batch_size(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.batch_size).context("batch_size must be greater than 0")
    }

    pub fn blame_timeout(&self) -> Duration {
        Duration::from_secs(self.blame_timeout_secs)
    }

    /// The configured project id, or the repository directory name
    pub fn project_id(&self) -> String {
        self.project_id
            .clone()
            .unwrap_or_else(|| default_project_id(&self.repo_path))
    }

    pub fn graph_path(&self) -> PathBuf {
        self.graph_path
            .clone()
            .unwrap_or_else(|| cache::get_graph_db_path(&self.repo_path))
    }

    /// Write an example config file into the repository root.
    ///
    /// Returns the path and whether the file was newly written.
    pub fn init(repo_path: &Path) -> Result<(PathBuf, bool)> {
        let path = repo_path.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Ok((path, false));
        }
        std::fs::write(&path, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok((path, true))
    }
}

/// Name of the repository directory, used when no project id is configured
pub fn default_project_id(repo_path: &Path) -> String {
    let canonical = repo_path
        .canonicalize()
        .unwrap_or_else(|_| repo_path.to_path_buf());
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "default".to_string())
}

const EXAMPLE_CONFIG: &str = r#"# repograph configuration

# Label for index runs (default: repository directory name).
# Records keep the project id they were mined with.
# project_id = "my-project"

# Records per store round-trip
batch_size = 100

# Per-file line authorship via `git blame`
blame_enabled = true
blame_workers = 8
blame_timeout_secs = 60

# Graph database directory (default: per-repository cache dir)
# graph_path = ".repograph/graph_db"
"#;
