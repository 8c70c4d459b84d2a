//! CLI command definitions and handlers

mod index;
mod init;
mod stats;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse and validate batch size (at least 1)
fn parse_batch_size(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("batch size must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// repograph - index mined repository history into a property graph
#[derive(Parser, Debug)]
#[command(name = "repograph")]
#[command(
    version,
    about = "Index a repository's commits, developers, branches, files, methods and blame into a property graph",
    after_help = "\
Examples:
  repograph init .                               Write an example repograph.toml
  repograph index . --records records.json       Index a record snapshot
  repograph --batch-size 500 index .             Larger store round-trips
  repograph stats .                              Node and edge counts"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Records per store round-trip (overrides repograph.toml)
    #[arg(long, global = true, value_parser = parse_batch_size)]
    pub batch_size: Option<usize>,

    /// Number of parallel blame workers (1-64)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a record snapshot into the repository's graph
    Index {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Record snapshot (default: the repository's cached records.json)
        #[arg(long, short = 'r')]
        records: Option<PathBuf>,

        /// Project label for this run (records keep their mined project id)
        #[arg(long, env = "REPOGRAPH_PROJECT_ID")]
        project_id: Option<String>,

        /// Skip per-file blame
        #[arg(long)]
        no_blame: bool,
    },

    /// Show node and edge counts of the indexed graph
    Stats {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Write a repograph.toml with example settings
    Init {
        /// Path to the repository
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Index {
            path,
            records,
            project_id,
            no_blame,
        } => index::run(
            &path,
            index::IndexArgs {
                records,
                project_id,
                no_blame,
                batch_size: cli.batch_size,
                workers: cli.workers,
            },
        ),
        Commands::Stats { path } => stats::run(&path),
        Commands::Init { path } => init::run(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_parse_batch_size() {
        assert_eq!(parse_batch_size("250"), Ok(250));
        assert!(parse_batch_size("0").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "repograph",
            "index",
            "/tmp/repo",
            "--records",
            "r.json",
            "--batch-size",
            "50",
            "--workers",
            "2",
            "--no-blame",
        ])
        .unwrap();

        assert_eq!(cli.batch_size, Some(50));
        assert_eq!(cli.workers, Some(2));
        match cli.command {
            Commands::Index {
                path,
                records,
                no_blame,
                ..
            } => {
                assert_eq!(path, PathBuf::from("/tmp/repo"));
                assert_eq!(records, Some(PathBuf::from("r.json")));
                assert!(no_blame);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(Cli::try_parse_from(["repograph", "--batch-size", "0", "stats"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
