//! Foundation types for Lore.
//!
//! This crate provides the identity, temporal, and payload types shared by
//! every other Lore crate.
//!
//! # Key Types
//!
//! - [`EntityId`], [`BranchId`], [`CampaignId`], [`SnapshotId`] — UUID v7 identifiers
//! - [`EntityType`] — the kind of campaign entity a payload describes
//! - [`EntityKey`] — `(EntityType, EntityId)` pair addressing one entity
//! - [`WorldTime`] — in-fiction calendar instant, distinct from wall-clock time
//! - [`Payload`] — normalized string-keyed tree holding full entity state

pub mod entity;
pub mod error;
pub mod id;
pub mod payload;
pub mod temporal;

pub use entity::{EntityKey, EntityType};
pub use error::TypeError;
pub use id::{BranchId, CampaignId, EntityId, SnapshotId};
pub use payload::{
    check_keys, json_kind, payload_from_value, payload_to_value, Payload, PATH_SEPARATOR,
};
pub use temporal::WorldTime;
