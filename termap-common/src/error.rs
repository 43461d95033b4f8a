//! Common error types for termap

use thiserror::Error;

/// Common result type for termap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the termap crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or uploaded content
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected by the configured duplicate policy
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
