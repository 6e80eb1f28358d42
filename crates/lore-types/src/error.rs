use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("invalid payload key {0:?}: keys must be non-empty and must not contain '.'")]
    InvalidKey(String),
}
