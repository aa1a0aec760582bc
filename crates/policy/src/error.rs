//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The function-choice configuration is inconsistent.
    #[error("invalid function choice: {0}")]
    Invalid(String),

    /// Failed to parse a function-choice document.
    #[error("failed to parse function choice: {0}")]
    Parse(String),

    /// An I/O error occurred while reading the configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
