use std::collections::BTreeMap;

use lore_diff::is_within;
use lore_types::EntityType;
use serde::{Deserialize, Serialize};

/// Paths the merge engine must never diff.
///
/// Exclusions stand in for per-entity-type merge routines: every kind shares
/// one differ, and the fields that differ legitimately between branches (the
/// identifier, derived caches) are listed here instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Excluded for every entity type.
    pub excluded_paths: Vec<String>,
    /// Additional exclusions per entity type.
    pub type_exclusions: BTreeMap<EntityType, Vec<String>>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            excluded_paths: vec!["id".to_string()],
            type_exclusions: BTreeMap::new(),
        }
    }
}

impl MergeConfig {
    /// A configuration that diffs every path.
    pub fn without_exclusions() -> Self {
        Self {
            excluded_paths: Vec::new(),
            type_exclusions: BTreeMap::new(),
        }
    }

    /// Add a global exclusion.
    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.push(path.into());
        self
    }

    /// Add an exclusion for one entity type.
    pub fn exclude_for(mut self, entity_type: EntityType, path: impl Into<String>) -> Self {
        self.type_exclusions
            .entry(entity_type)
            .or_default()
            .push(path.into());
        self
    }

    /// The effective exclusion list for an entity type (global first).
    pub fn exclusions_for(&self, entity_type: Option<&EntityType>) -> Vec<String> {
        let mut paths = self.excluded_paths.clone();
        if let Some(extra) = entity_type.and_then(|t| self.type_exclusions.get(t)) {
            paths.extend(extra.iter().cloned());
        }
        paths
    }
}

/// Returns `true` if `path` is excluded or lies beneath an excluded path.
pub(crate) fn is_excluded(exclusions: &[String], path: &str) -> bool {
    !path.is_empty() && exclusions.iter().any(|ex| !ex.is_empty() && is_within(path, ex))
}
