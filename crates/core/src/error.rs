//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not generate API key: {0}")]
    KeyGeneration(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
