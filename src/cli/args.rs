//! Command-line argument parsing for shelf_sync
//!
//! This module defines the CLI structure using clap derive macros, covering
//! status inspection, package selection, and synchronization.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// shelf_sync - keep an offline text library in sync
#[derive(Parser, Debug)]
#[command(
    name = "shelf_sync",
    version,
    about = "Keep a selected set of library packages downloaded and up to date",
    long_about = "Synchronizes an offline text library: resolves package selections into \
a desired set of books, diffs against local storage and server timestamps, and drives \
bundle downloads with retry and progress reporting."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Library directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub library_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show selection, local state, and pending work
    Status,

    /// Download missing or stale books and remove unwanted archives
    Sync(SyncArgs),

    /// List catalog packages and their selection state
    Packages,

    /// Select a package for offline availability
    Select(PackageArgs),

    /// Deselect a package
    Deselect(PackageArgs),

    /// Report whether a periodic staleness check is due
    Check,
}

/// Arguments for the sync command
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Show what would be downloaded and deleted without doing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments naming a package
#[derive(Args, Debug, Clone)]
pub struct PackageArgs {
    /// Package name as listed by `packages`
    pub name: String,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level derived from the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "debug"
        } else if self.global.verbose {
            "info"
        } else if self.global.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_structure() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn log_level_follows_flags() {
        let cli = Cli::parse_from(["shelf_sync", "--very-verbose", "status"]);
        assert_eq!(cli.log_level(), "debug");

        let cli = Cli::parse_from(["shelf_sync", "-q", "status"]);
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn sync_accepts_dry_run() {
        let cli = Cli::parse_from(["shelf_sync", "sync", "--dry-run"]);
        match cli.command {
            Commands::Sync(args) => assert!(args.dry_run),
            _ => panic!("expected sync command"),
        }
    }
}
