//! Server startup and configuration errors.

use eigion_core::store::StoreError;
use thiserror::Error;

/// Errors that stop the server from starting or keep running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A file or socket operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The database could not be opened or migrated.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration is unusable.
    #[error("configuration error: {context}")]
    Config {
        /// What is wrong with the configuration.
        context: String,
    },
}

impl ServerError {
    /// Shorthand for a [`ServerError::Config`] error.
    pub fn config(context: impl Into<String>) -> Self {
        Self::Config { context: context.into() }
    }
}
