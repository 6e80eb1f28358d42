use lore_types::TypeError;

/// Errors from version store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The entity or branch does not exist (or is not visible to the caller).
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Structurally invalid request: cross-campaign branch, malformed payload,
    /// inverted validity interval, duplicate branch.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller's expected version does not match the entity's current one.
    #[error("optimistic lock conflict on {entity}: expected version {expected}, actual version {actual}")]
    OptimisticLockConflict {
        entity: String,
        expected: u64,
        actual: u64,
    },

    /// Payload could not be compressed.
    #[error("compression failed: {0}")]
    Compression(String),

    /// Payload could not be decompressed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// CRC32 of the compressed bytes does not match the recorded one.
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// BLAKE3 digest of the decompressed bytes does not match.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: String, computed: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    pub(crate) fn not_found(what: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            what,
            id: id.to_string(),
        }
    }

    /// Returns `true` for [`StoreError::OptimisticLockConflict`].
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Self::OptimisticLockConflict { .. })
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
