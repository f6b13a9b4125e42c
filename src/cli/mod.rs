//! Command-line interface for forumdb.
//!
//! Opens a storage directory and runs one maintenance or inspection command,
//! printing results as JSON.

pub mod args;
pub mod commands;
pub mod utils;

use crate::Result;
use std::process;

pub use args::{Command, Invocation};
pub use utils::*;

/// Main entry point for the CLI application
pub fn run() -> Result<()> {
    // Parse command line arguments
    let invocation = match args::parse_args() {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error parsing arguments: {}", e);
            args::print_usage();
            process::exit(1);
        }
    };

    let data_dir = utils::resolve_data_dir(invocation.data_dir);
    let storage = commands::open_storage(&data_dir, invocation.server_profile)?;

    // Execute command
    match invocation.command {
        Command::Status => commands::status(&storage),
        Command::Clear => commands::clear(&storage),
        Command::Posts { thread, query } => commands::posts(&storage, &thread, &query),
        Command::Threads { forum, query } => commands::threads(&storage, &forum, &query),
        Command::Users { forum, query } => commands::users(&storage, &forum, &query),
    }
}
