//! Error types for cadence-journal

use thiserror::Error;

/// Journal error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("export error: {0}")]
    Export(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
