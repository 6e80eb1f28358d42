//! Diff engine for Lore.
//!
//! Computes structural diffs between two versions of an entity payload. One
//! generic recursive differ serves every entity kind: nested objects are
//! walked with dot-joined paths, every other value (arrays included) is
//! compared as a whole.
//!
//! # Key Types
//!
//! - [`PayloadDiff`] / [`PathChange`] -- path-level diff of two payloads
//! - [`join_path`] / [`is_within`] -- dot-delimited field paths

pub mod path;
pub mod payload_diff;

pub use path::{is_within, join_path, PATH_SEPARATOR};
pub use payload_diff::{diff_payloads, PathChange, PayloadDiff};
