//! shelf_sync CLI application
//!
//! Command-line interface for keeping an offline text library in sync.
//! Resolves package selections, diffs local state against server
//! timestamps, and drives bundle downloads with progress reporting.

use std::process;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use shelf_sync::cli::{
    handle_check, handle_packages, handle_select, handle_status, handle_sync, Cli, Commands,
};
use shelf_sync::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(&cli);

    info!("shelf_sync v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match &cli.command {
        Commands::Status => handle_status(&cli.global).await,
        Commands::Sync(args) => handle_sync(args, &cli.global).await,
        Commands::Packages => handle_packages(&cli.global).await,
        Commands::Select(args) => handle_select(args, &cli.global, true).await,
        Commands::Deselect(args) => handle_select(args, &cli.global, false).await,
        Commands::Check => handle_check(&cli.global).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("shelf_sync={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();
}
