//! Error types for cadence-core

use crate::{MetaId, OpId, ResourceId, StateId};
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("insufficient resource {id}: need {need}, have {have}")]
    InsufficientResource {
        id: ResourceId,
        need: f64,
        have: f64,
    },

    #[error("operation {0} cannot be performed in the current state")]
    IllegalOperation(OpId),

    #[error("meta-operation {0} cannot be executed in the current state")]
    IllegalMeta(MetaId),

    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("unknown state: {0}")]
    UnknownState(StateId),

    #[error("unknown operation: {0}")]
    UnknownOperation(OpId),

    #[error("unknown meta-operation: {0}")]
    UnknownMeta(MetaId),

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
