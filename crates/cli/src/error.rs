//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The config file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has invalid values.
    #[error("config error: {0}")]
    Config(String),

    /// The parser found nothing in the probed text.
    #[error("no function call found")]
    NoCall,

    #[error(transparent)]
    Connector(#[from] connector::Error),

    #[error(transparent)]
    Policy(#[from] policy::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
