//! Common error types for Shelf

use thiserror::Error;

/// Common result type for Shelf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Shelf services
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input (bad facet configuration, malformed query)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
