//! MySQL collaborator error types.

use thiserror::Error;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// MySQL collaborator errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Driver error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The runtime driving the driver could not be started.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server returned something unexpected.
    #[error("unexpected result: {0}")]
    Protocol(String),
}

impl From<Error> for myslice_core::Error {
    fn from(err: Error) -> Self {
        myslice_core::Error::query(err)
    }
}
