use std::fmt;

use lore_types::Payload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum rendered width of one value in a conflict description.
const MAX_VALUE_WIDTH: usize = 48;

/// How the two sides disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// Both sides changed the value, to different results.
    BothModified,
    /// Source deleted the entity; target modified it.
    DeletedModified,
    /// Source modified the entity; target deleted it.
    ModifiedDeleted,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothModified => write!(f, "BOTH_MODIFIED"),
            Self::DeletedModified => write!(f, "DELETED_MODIFIED"),
            Self::ModifiedDeleted => write!(f, "MODIFIED_DELETED"),
        }
    }
}

/// One divergent path.
///
/// `None` values mean "absent on that side", which is distinct from a JSON
/// `null`. The empty path denotes the entity as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub base_value: Option<Value>,
    pub source_value: Option<Value>,
    pub target_value: Option<Value>,
}

impl MergeConflict {
    /// Returns `true` if the conflict concerns the entity's existence rather
    /// than a single field.
    pub fn is_entity_level(&self) -> bool {
        self.path.is_empty()
    }
}

/// Outcome of a three-way merge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub has_conflicts: bool,
    /// One entry per divergent path, ordered by path.
    pub conflicts: Vec<MergeConflict>,
    /// The reconciled state; `None` when conflicts exist or the entity ends
    /// up deleted.
    pub merged_payload: Option<Payload>,
}

impl MergeResult {
    /// A conflict-free result.
    pub fn clean(merged_payload: Option<Payload>) -> Self {
        Self {
            has_conflicts: false,
            conflicts: Vec::new(),
            merged_payload,
        }
    }

    /// A result carrying conflicts; never has a merged payload.
    pub fn conflicted(conflicts: Vec<MergeConflict>) -> Self {
        Self {
            has_conflicts: !conflicts.is_empty(),
            conflicts,
            merged_payload: None,
        }
    }

    /// Returns `true` if the merge resolved to the entity not existing.
    pub fn is_deletion(&self) -> bool {
        !self.has_conflicts && self.merged_payload.is_none()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Render a conflict for humans.
///
/// Deterministic and side-effect free: names the field and summarizes the
/// three competing values.
pub fn conflict_description(conflict: &MergeConflict) -> String {
    let subject = if conflict.is_entity_level() {
        "The entity".to_string()
    } else {
        format!("Field \"{}\"", conflict.path)
    };
    let base = render_value(conflict.base_value.as_ref());
    let source = render_value(conflict.source_value.as_ref());
    let target = render_value(conflict.target_value.as_ref());

    match conflict.kind {
        ConflictKind::BothModified => format!(
            "{subject} was changed on both branches (base: {base}, source: {source}, target: {target})"
        ),
        ConflictKind::DeletedModified => format!(
            "{subject} was deleted in source but modified in target (base: {base}, target: {target})"
        ),
        ConflictKind::ModifiedDeleted => format!(
            "{subject} was modified in source but deleted in target (base: {base}, source: {source})"
        ),
    }
}

fn render_value(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "(absent)".to_string();
    };
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_VALUE_WIDTH {
        return rendered;
    }
    let cut: String = rendered.chars().take(MAX_VALUE_WIDTH - 3).collect();
    format!("{cut}...")
}
