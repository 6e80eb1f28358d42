//! Payload-level diff: compare two versions of an entity payload.
//!
//! Payloads are `BTreeMap<String, serde_json::Value>`. Nested objects are
//! walked recursively and reported with dot-joined paths; arrays and scalars
//! are leaves compared by whole-value equality.

use std::collections::BTreeSet;

use lore_types::Payload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::join_path;

/// The result of comparing two payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadDiff {
    /// Changes ordered by path.
    pub changes: Vec<PathChange>,
}

impl PayloadDiff {
    /// Create an empty payload diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of added paths.
    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PathChange::Added { .. }))
            .count()
    }

    /// Number of removed paths.
    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PathChange::Removed { .. }))
            .count()
    }

    /// Number of modified paths.
    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, PathChange::Modified { .. }))
            .count()
    }

    /// Iterator over the changed paths.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(PathChange::path)
    }
}

/// A single change between two payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathChange {
    /// A new value appeared at the path.
    Added { path: String, value: Value },
    /// The value at the path disappeared.
    Removed { path: String, value: Value },
    /// The value at the path changed.
    Modified {
        path: String,
        old: Value,
        new: Value,
    },
}

impl PathChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }
}

/// Compute the diff between two payloads.
///
/// Paths present only in `new` are `Added`, paths present only in `old` are
/// `Removed`, and paths present in both with different values are `Modified`.
/// When both sides hold an object at a path, the diff descends into it
/// instead of reporting the object as a whole.
pub fn diff_payloads(old: &Payload, new: &Payload) -> PayloadDiff {
    let mut changes = Vec::new();
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        diff_value(key.clone(), old.get(key), new.get(key), &mut changes);
    }
    PayloadDiff { changes }
}

fn diff_value(path: String, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<PathChange>) {
    match (old, new) {
        (None, None) => {}
        (None, Some(value)) => out.push(PathChange::Added {
            path,
            value: value.clone(),
        }),
        (Some(value), None) => out.push(PathChange::Removed {
            path,
            value: value.clone(),
        }),
        (Some(a), Some(b)) if a == b => {}
        (Some(Value::Object(a)), Some(Value::Object(b))) => diff_objects(&path, a, b, out),
        (Some(a), Some(b)) => out.push(PathChange::Modified {
            path,
            old: a.clone(),
            new: b.clone(),
        }),
    }
}

fn diff_objects(
    prefix: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    out: &mut Vec<PathChange>,
) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        diff_value(join_path(prefix, key), old.get(key), new.get(key), out);
    }
}
