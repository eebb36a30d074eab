//! Command-line interface components
//!
//! This module contains CLI-specific code for the shelf_sync application,
//! including argument parsing, command handlers, and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, GlobalArgs, PackageArgs, SyncArgs};
pub use commands::{handle_check, handle_packages, handle_select, handle_status, handle_sync};
pub use progress::attach_progress_bar;
