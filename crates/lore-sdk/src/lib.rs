//! High-level SDK for Lore.
//!
//! Ties the version store and the merge engine together: entity reads and
//! writes with optimistic locking, branch forks with inherited history, and
//! branch merges with conflict resolution. [`Lore`] is the main entry point
//! for applications embedding the store.

pub mod branch;
pub mod config;
pub mod entity;
pub mod error;
pub mod lineage;
pub mod merge;
pub mod repository;

pub use branch::BranchService;
pub use config::LoreConfig;
pub use entity::EntityService;
pub use error::{SdkError, SdkResult};
pub use lineage::{common_ancestor, lineage, resolve_in_lineage, LineageStep};
pub use merge::{
    EntityMerge, MergeAction, MergeOrchestrator, MergePreview, MergeReport, MergeResolutions,
};
pub use repository::Lore;

// Re-export key types
pub use lore_merge::{conflict_description, ConflictKind, MergeConflict, MergeResult, Resolution, Resolutions};
pub use lore_store::{BranchRecord, StoreError, VersionSnapshot, VersionStore};
pub use lore_types::{BranchId, CampaignId, EntityId, EntityKey, EntityType, Payload, WorldTime};
