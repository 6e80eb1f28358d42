use lore_types::{BranchId, EntityKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("branch not found: {0}")]
    BranchNotFound(BranchId),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("merge blocked by {count} unresolved conflict(s)")]
    UnresolvedConflicts {
        count: usize,
        entities: Vec<EntityKey>,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] lore_store::StoreError),

    #[error("merge error: {0}")]
    Merge(#[from] lore_merge::MergeError),
}

impl SdkError {
    /// Returns `true` when a write lost an optimistic-lock race and should be
    /// retried after re-reading the entity.
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_lock_conflict())
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
