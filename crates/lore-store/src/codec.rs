//! Compact on-disk representation of snapshot payloads.
//!
//! A payload is serialized to canonical JSON (keys sorted at every level),
//! compressed with zstd, and framed with:
//!
//! - the uncompressed length,
//! - a CRC32 of the compressed bytes (cheap corruption check),
//! - a BLAKE3 digest of the uncompressed bytes (content identity).
//!
//! [`decompress_payload`] is the exact inverse of [`compress_payload`]; it
//! reproduces the entity payload field for field.

use std::fmt;

use lore_types::Payload;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::record::VersionSnapshot;

/// A payload in its stored, compressed form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedPayload {
    /// zstd-compressed canonical JSON.
    pub data: Vec<u8>,
    /// Length of the canonical JSON before compression.
    pub raw_len: u64,
    /// CRC32 of `data`.
    pub crc32: u32,
    /// BLAKE3 digest of the canonical JSON.
    pub digest: [u8; 32],
}

impl CompressedPayload {
    /// Size of the compressed bytes.
    pub fn compressed_len(&self) -> usize {
        self.data.len()
    }

    /// Hex-encoded content digest.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Short hex digest (first 8 characters).
    pub fn short_digest(&self) -> String {
        hex::encode(&self.digest[..4])
    }
}

impl fmt::Debug for CompressedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedPayload")
            .field("digest", &self.short_digest())
            .field("raw_len", &self.raw_len)
            .field("compressed_len", &self.data.len())
            .finish()
    }
}

/// Compress a payload at the given zstd level.
pub fn compress_payload(payload: &Payload, level: i32) -> StoreResult<CompressedPayload> {
    let raw = serde_json::to_vec(payload).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let data = zstd::encode_all(raw.as_slice(), level)
        .map_err(|e| StoreError::Compression(e.to_string()))?;

    Ok(CompressedPayload {
        crc32: crc32fast::hash(&data),
        digest: *blake3::hash(&raw).as_bytes(),
        raw_len: raw.len() as u64,
        data,
    })
}

/// Restore a payload from its compressed form.
///
/// The CRC32 and length are always checked; the BLAKE3 digest is checked
/// when `verify_digest` is set.
pub fn decompress_payload(
    compressed: &CompressedPayload,
    verify_digest: bool,
) -> StoreResult<Payload> {
    let computed = crc32fast::hash(&compressed.data);
    if computed != compressed.crc32 {
        return Err(StoreError::ChecksumMismatch {
            expected: compressed.crc32,
            computed,
        });
    }

    let raw = zstd::decode_all(compressed.data.as_slice())
        .map_err(|e| StoreError::Decompression(e.to_string()))?;
    if raw.len() as u64 != compressed.raw_len {
        return Err(StoreError::Decompression(format!(
            "length mismatch: expected {} bytes, got {}",
            compressed.raw_len,
            raw.len()
        )));
    }

    if verify_digest {
        let digest = *blake3::hash(&raw).as_bytes();
        if digest != compressed.digest {
            return Err(StoreError::DigestMismatch {
                expected: compressed.digest_hex(),
                computed: hex::encode(digest),
            });
        }
    }

    serde_json::from_slice(&raw).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Restore the full entity payload recorded by a snapshot.
///
/// Pure: no store access, no side effects.
pub fn decompress_version(snapshot: &VersionSnapshot) -> StoreResult<Payload> {
    decompress_payload(&snapshot.payload, true)
}
