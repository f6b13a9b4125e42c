//! Utility functions for CLI operations.

use crate::error::{ForumError, Result};
use crate::forum::constants::DEFAULT_DATA_DIR;
use serde::Serialize;
use std::env;
use std::path::PathBuf;

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "FORUMDB_DATA_DIR";

/// Resolves the data directory: explicit flag, then environment, then the default.
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os(DATA_DIR_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// Renders a value as pretty JSON.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ForumError::serialization(format!("Failed to render JSON: {}", e)))
}

/// Prints a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", to_pretty_json(value)?);
    Ok(())
}
