//! Temporal version store for Lore.
//!
//! Every committed write to a campaign entity appends one immutable
//! [`VersionSnapshot`] keyed by `(entity type, entity id, branch, valid_from)`.
//! Readers ask for the state of an entity "as of" a world time on a branch;
//! the store answers with the snapshot whose `valid_from` is the greatest one
//! not after the query time.
//!
//! # Storage Layout
//!
//! - an entity table, one row per entity, carrying the `version` counter used
//!   as the optimistic-lock token;
//! - a branch table, recording each branch's owning campaign and parent;
//! - one append-only snapshot stream per entity type, indexed by
//!   `(entity id, branch id)` and kept sorted by `valid_from`.
//!
//! Snapshot payloads are held in a compact form (see [`codec`]) and restored
//! with [`decompress_version`].
//!
//! # Storage Backends
//!
//! All backends implement the [`VersionStore`] trait:
//!
//! - [`InMemoryVersionStore`] -- `RwLock`-guarded tables for tests and embedding
//!
//! # Design Rules
//!
//! 1. Snapshots are immutable once written; `valid_to` is recorded as given.
//! 2. The entity-row version bump and the snapshot insert commit together or
//!    not at all.
//! 3. A version mismatch is reported as [`StoreError::OptimisticLockConflict`];
//!    the store never retries or merges on the caller's behalf.
//! 4. Branches are independent append streams; reads on one branch never
//!    observe uncommitted writes on any branch.

pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use codec::{compress_payload, decompress_payload, decompress_version, CompressedPayload};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryVersionStore;
pub use record::{BranchRecord, CreateVersion, EntityRecord, ExpectedVersion, VersionSnapshot};
pub use traits::VersionStore;
