/// Errors produced when applying merge resolutions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("conflict at {path:?} has no resolution")]
    UnresolvedConflict { path: String },

    #[error("invalid resolution at {path:?}: {reason}")]
    InvalidResolution { path: String, reason: String },
}
