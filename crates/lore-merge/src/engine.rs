//! Three-way merge of entity payloads.
//!
//! Existence is settled first (created, deleted, or present on each side).
//! When both sides hold a payload the engine walks the union of their field
//! paths: objects present on both sides are descended into, every other value
//! is an atomic leaf.

use std::collections::BTreeSet;

use lore_diff::{diff_payloads, join_path};
use lore_types::{json_kind, payload_to_value, EntityType, Payload};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{is_excluded, MergeConfig};
use crate::conflict::{ConflictKind, MergeConflict, MergeResult};
use crate::error::MergeError;
use crate::resolution::{Resolution, Resolutions};

/// Path denoting the entity as a whole.
const ENTITY_PATH: &str = "";

/// Three-way merge engine.
///
/// Holds only immutable configuration; safe to share across threads and to
/// call concurrently.
#[derive(Clone, Debug, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `source` into `target` against their common ancestor `base`.
    ///
    /// `None` means the entity does not exist on that side. Only the global
    /// exclusions apply.
    pub fn detect_conflicts(
        &self,
        base: Option<&Payload>,
        source: Option<&Payload>,
        target: Option<&Payload>,
    ) -> MergeResult {
        let exclusions = self.config.exclusions_for(None);
        merge_entity(&exclusions, base, source, target, None)
    }

    /// Like [`detect_conflicts`](Self::detect_conflicts), with the exclusions
    /// configured for `entity_type` added.
    pub fn detect_conflicts_for(
        &self,
        entity_type: &EntityType,
        base: Option<&Payload>,
        source: Option<&Payload>,
        target: Option<&Payload>,
    ) -> MergeResult {
        let exclusions = self.config.exclusions_for(Some(entity_type));
        merge_entity(&exclusions, base, source, target, None)
    }

    /// Recompute the merge, substituting the caller's choice at every
    /// conflicting path.
    ///
    /// Returns the merged payload, or `None` if the entity ends up deleted.
    /// A resolution at the empty path picks the whole entity and overrides
    /// field-level choices.
    pub fn apply_resolutions(
        &self,
        base: Option<&Payload>,
        source: Option<&Payload>,
        target: Option<&Payload>,
        resolutions: &Resolutions,
    ) -> Result<Option<Payload>, MergeError> {
        let exclusions = self.config.exclusions_for(None);
        resolve(&exclusions, base, source, target, resolutions)
    }

    /// Like [`apply_resolutions`](Self::apply_resolutions), with the
    /// exclusions configured for `entity_type` added.
    pub fn apply_resolutions_for(
        &self,
        entity_type: &EntityType,
        base: Option<&Payload>,
        source: Option<&Payload>,
        target: Option<&Payload>,
        resolutions: &Resolutions,
    ) -> Result<Option<Payload>, MergeError> {
        let exclusions = self.config.exclusions_for(Some(entity_type));
        resolve(&exclusions, base, source, target, resolutions)
    }
}

/// Merge with the default configuration (only `id` excluded).
pub fn detect_conflicts(
    base: Option<&Payload>,
    source: Option<&Payload>,
    target: Option<&Payload>,
) -> MergeResult {
    MergeEngine::default().detect_conflicts(base, source, target)
}

fn resolve(
    exclusions: &[String],
    base: Option<&Payload>,
    source: Option<&Payload>,
    target: Option<&Payload>,
    resolutions: &Resolutions,
) -> Result<Option<Payload>, MergeError> {
    if let Some(choice) = resolutions.get(ENTITY_PATH) {
        debug!(?choice, "entity resolved as a whole");
        return resolve_entity(choice, base, source, target);
    }
    let result = merge_entity(exclusions, base, source, target, Some(resolutions));
    match result.conflicts.first() {
        Some(open) => Err(MergeError::UnresolvedConflict {
            path: open.path.clone(),
        }),
        None => Ok(result.merged_payload),
    }
}

fn resolve_entity(
    choice: &Resolution,
    base: Option<&Payload>,
    source: Option<&Payload>,
    target: Option<&Payload>,
) -> Result<Option<Payload>, MergeError> {
    match choice {
        Resolution::Base => Ok(base.cloned()),
        Resolution::Source => Ok(source.cloned()),
        Resolution::Target => Ok(target.cloned()),
        Resolution::Remove | Resolution::Value(Value::Null) => Ok(None),
        Resolution::Value(Value::Object(map)) => Ok(Some(object_to_payload(map.clone()))),
        Resolution::Value(other) => Err(MergeError::InvalidResolution {
            path: ENTITY_PATH.to_string(),
            reason: format!("an entity must be an object, got {}", json_kind(other)),
        }),
    }
}

fn merge_entity(
    exclusions: &[String],
    base: Option<&Payload>,
    source: Option<&Payload>,
    target: Option<&Payload>,
    resolutions: Option<&Resolutions>,
) -> MergeResult {
    match (base, source, target) {
        (None, None, None) => MergeResult::clean(None),
        (None, Some(created), None) | (None, None, Some(created)) => {
            MergeResult::clean(Some(created.clone()))
        }
        (Some(_), None, None) => MergeResult::clean(None),
        (Some(base), None, Some(target)) => {
            if same_content(exclusions, base, target) {
                MergeResult::clean(None)
            } else {
                entity_conflict(ConflictKind::DeletedModified, base, None, Some(target))
            }
        }
        (Some(base), Some(source), None) => {
            if same_content(exclusions, base, source) {
                MergeResult::clean(None)
            } else {
                entity_conflict(ConflictKind::ModifiedDeleted, base, Some(source), None)
            }
        }
        (None, Some(source), Some(target)) => {
            let walker = Walker::new(exclusions, resolutions, true);
            walker.run(None, source, target)
        }
        (Some(base), Some(source), Some(target)) => {
            let walker = Walker::new(exclusions, resolutions, false);
            walker.run(Some(base), source, target)
        }
    }
}

/// Equal apart from excluded paths.
fn same_content(exclusions: &[String], a: &Payload, b: &Payload) -> bool {
    diff_payloads(a, b)
        .paths()
        .all(|path| is_excluded(exclusions, path))
}

fn entity_conflict(
    kind: ConflictKind,
    base: &Payload,
    source: Option<&Payload>,
    target: Option<&Payload>,
) -> MergeResult {
    MergeResult::conflicted(vec![MergeConflict {
        path: ENTITY_PATH.to_string(),
        kind,
        base_value: Some(payload_to_value(base)),
        source_value: source.map(payload_to_value),
        target_value: target.map(payload_to_value),
    }])
}

fn object_to_payload(map: Map<String, Value>) -> Payload {
    map.into_iter().collect()
}

/// Field-level walk over two present payloads.
struct Walker<'a> {
    exclusions: &'a [String],
    resolutions: Option<&'a Resolutions>,
    /// Both sides created the entity independently: there is no ancestor, so
    /// every difference is a disagreement.
    two_way: bool,
    conflicts: Vec<MergeConflict>,
}

impl<'a> Walker<'a> {
    fn new(exclusions: &'a [String], resolutions: Option<&'a Resolutions>, two_way: bool) -> Self {
        Self {
            exclusions,
            resolutions,
            two_way,
            conflicts: Vec::new(),
        }
    }

    fn run(mut self, base: Option<&Payload>, source: &Payload, target: &Payload) -> MergeResult {
        let base = base.map(payload_to_value);
        let source = payload_to_value(source);
        let target = payload_to_value(target);
        let merged = self.merge(ENTITY_PATH, base.as_ref(), Some(&source), Some(&target));

        if !self.conflicts.is_empty() {
            self.conflicts.sort_by(|a, b| a.path.cmp(&b.path));
            return MergeResult::conflicted(self.conflicts);
        }
        match merged {
            Some(Value::Object(map)) => MergeResult::clean(Some(object_to_payload(map))),
            _ => MergeResult::clean(None),
        }
    }

    /// Merged value at `path`, or `None` if the path ends up absent.
    fn merge(
        &mut self,
        path: &str,
        base: Option<&Value>,
        source: Option<&Value>,
        target: Option<&Value>,
    ) -> Option<Value> {
        if is_excluded(self.exclusions, path) {
            return target.or(source).or(base).cloned();
        }
        if source == target {
            return source.cloned();
        }
        if let (Some(Value::Object(s)), Some(Value::Object(t))) = (source, target) {
            match base {
                None => return Some(self.merge_objects(path, None, s, t)),
                Some(Value::Object(b)) => return Some(self.merge_objects(path, Some(b), s, t)),
                Some(_) => {}
            }
        }
        if !self.two_way {
            if source == base {
                return target.cloned();
            }
            if target == base {
                return source.cloned();
            }
        }
        self.conflict(path, base, source, target)
    }

    fn merge_objects(
        &mut self,
        path: &str,
        base: Option<&Map<String, Value>>,
        source: &Map<String, Value>,
        target: &Map<String, Value>,
    ) -> Value {
        let keys: BTreeSet<&String> = base
            .into_iter()
            .flat_map(|b| b.keys())
            .chain(source.keys())
            .chain(target.keys())
            .collect();

        let mut merged = Map::new();
        for key in keys {
            let child = join_path(path, key);
            let value = self.merge(
                &child,
                base.and_then(|b| b.get(key)),
                source.get(key),
                target.get(key),
            );
            if let Some(value) = value {
                merged.insert(key.clone(), value);
            }
        }
        Value::Object(merged)
    }

    fn conflict(
        &mut self,
        path: &str,
        base: Option<&Value>,
        source: Option<&Value>,
        target: Option<&Value>,
    ) -> Option<Value> {
        if let Some(choice) = self.resolutions.and_then(|r| r.get(path)) {
            debug!(path, ?choice, "conflict resolved");
            return choice.choose(base, source, target);
        }
        self.conflicts.push(MergeConflict {
            path: path.to_string(),
            kind: ConflictKind::BothModified,
            base_value: base.cloned(),
            source_value: source.cloned(),
            target_value: target.cloned(),
        });
        None
    }
}
