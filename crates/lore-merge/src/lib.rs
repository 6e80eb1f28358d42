//! Merge engine for Lore.
//!
//! Reconciles two divergent versions of an entity (`source` and `target`)
//! against their common ancestor (`base`). Non-conflicting edits are applied
//! automatically; every path edited differently on both sides is reported as a
//! [`MergeConflict`]. Disagreement is an ordinary [`MergeResult`], not an
//! error.
//!
//! The engine is pure: no I/O, no shared mutable state, and identical inputs
//! always produce identical results.

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod resolution;

pub use config::MergeConfig;
pub use conflict::{conflict_description, ConflictKind, MergeConflict, MergeResult};
pub use engine::{detect_conflicts, MergeEngine};
pub use error::MergeError;
pub use resolution::{Resolution, Resolutions};
