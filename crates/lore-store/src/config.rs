use serde::{Deserialize, Serialize};

/// Tuning knobs for a version store backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// zstd level used when compacting snapshot payloads.
    pub compression_level: i32,
    /// Whether reads recompute the BLAKE3 digest of decompressed payloads.
    pub verify_digest: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            verify_digest: true,
        }
    }
}
