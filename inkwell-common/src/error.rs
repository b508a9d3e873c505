//! Common error types for Inkwell

use thiserror::Error;

/// Common result type for Inkwell operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Inkwell services
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

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record exists but is in the wrong lifecycle state for the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// External text/image generation service failed or replied garbage
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Comic document could not be rendered
    #[error("Render error: {0}")]
    Render(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures of the service's own persisted state
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
