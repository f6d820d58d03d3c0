//! CLI error types.

use thiserror::Error;

/// Result alias for the CLI.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Slicing failed.
    #[error(transparent)]
    Slice(#[from] myslice_core::Error),

    /// MySQL connection or configuration failed.
    #[error(transparent)]
    MySql(#[from] myslice_mysql::Error),

    /// Invalid command-line arguments.
    #[error("invalid arguments: {0}")]
    Args(String),

    /// Output could not be written.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
