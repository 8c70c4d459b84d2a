//! Cache path utilities - uses ~/.cache/repograph/<repo-hash>/

use std::path::{Path, PathBuf};

use crate::models::natural_key;

/// Get the cache directory for a repository.
/// Uses ~/.cache/repograph/<repo-hash>/ on Unix, %LOCALAPPDATA%/repograph/<repo-hash>/ on Windows.
pub fn get_cache_dir(repo_path: &Path) -> PathBuf {
    let repo_hash = hash_path(repo_path);

    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("repograph").join(&repo_hash)
}

/// Default location of the record snapshot for a repository.
pub fn get_records_path(repo_path: &Path) -> PathBuf {
    get_cache_dir(repo_path).join("records.json")
}

/// Get the graph database path for a repository.
pub fn get_graph_db_path(repo_path: &Path) -> PathBuf {
    get_cache_dir(repo_path).join("graph_db")
}

/// Directory name for a repository: its sanitized name plus a short digest of
/// the canonical path.
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();
    let digest = natural_key(&[path_str.as_ref()]);

    // canonical file_name so "." resolves to the real directory name
    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{}", repo_name, &digest[..12])
}
