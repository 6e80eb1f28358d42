//! Branch merges.
//!
//! A merge reconciles every entity of a campaign between a source and a
//! target branch. For each entity the orchestrator resolves three states:
//! the common ancestor branch at the fork point (base), and both branch tips
//! at the merge's world time. Entities whose deletion field is set count as
//! absent. The engine's verdict is then committed on the target branch.

use std::collections::BTreeMap;
use std::sync::Arc;

use lore_merge::{MergeConflict, MergeEngine, MergeError, MergeResult, Resolutions};
use lore_store::{CreateVersion, ExpectedVersion, VersionSnapshot, VersionStore};
use lore_types::{BranchId, EntityKey, Payload, WorldTime};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{SdkError, SdkResult};
use crate::lineage::{common_ancestor, resolve_in_lineage};

/// Caller-chosen resolutions, per entity.
pub type MergeResolutions = BTreeMap<EntityKey, Resolutions>;

/// What a merge does to one entity on the target branch.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum MergeAction {
    /// The target already holds the merged state.
    Unchanged,
    /// Write this payload as a new snapshot.
    Write(Payload),
    /// Mark the entity deleted.
    Delete,
    /// Conflicts need a resolution first.
    Conflicted,
}

/// The merge plan for one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityMerge {
    pub key: EntityKey,
    /// Entity row version observed while planning; the commit expects it.
    pub version: u64,
    pub base: Option<Payload>,
    pub source: Option<Payload>,
    pub target: Option<Payload>,
    pub result: MergeResult,
    pub action: MergeAction,
}

/// A dry run of a branch merge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergePreview {
    pub source: BranchId,
    pub target: BranchId,
    pub ancestor: BranchId,
    /// World time at which base states were read.
    pub base_time: WorldTime,
    pub world_time: WorldTime,
    pub entities: Vec<EntityMerge>,
}

impl MergePreview {
    pub fn has_conflicts(&self) -> bool {
        self.entities.iter().any(|e| e.result.has_conflicts)
    }

    /// Every conflict, paired with its entity.
    pub fn conflicts(&self) -> impl Iterator<Item = (&EntityKey, &MergeConflict)> {
        self.entities
            .iter()
            .flat_map(|e| e.result.conflicts.iter().map(move |c| (&e.key, c)))
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts().count()
    }

    /// Entities the merge would write or delete.
    pub fn changed(&self) -> impl Iterator<Item = &EntityMerge> {
        self.entities
            .iter()
            .filter(|e| matches!(e.action, MergeAction::Write(_) | MergeAction::Delete))
    }
}

/// Outcome of an executed merge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeReport {
    pub ancestor: BranchId,
    pub base_time: WorldTime,
    /// Snapshots appended to the target branch (writes and deletions).
    pub written: Vec<VersionSnapshot>,
    pub deleted: usize,
    pub unchanged: usize,
}

/// Plans and executes merges between branches of one campaign.
#[derive(Clone)]
pub struct MergeOrchestrator {
    store: Arc<dyn VersionStore>,
    engine: MergeEngine,
    deletion_field: String,
}

impl MergeOrchestrator {
    pub fn new(
        store: Arc<dyn VersionStore>,
        engine: MergeEngine,
        deletion_field: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            deletion_field: deletion_field.into(),
        }
    }

    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    /// Compute the merge of `source` into `target` as of `world_time`
    /// without writing anything.
    pub fn preview(
        &self,
        source: &BranchId,
        target: &BranchId,
        world_time: WorldTime,
    ) -> SdkResult<MergePreview> {
        if source == target {
            return Err(SdkError::InvalidOperation(format!(
                "cannot merge branch {source} into itself"
            )));
        }
        let source_branch = self
            .store
            .branch(source)?
            .ok_or(SdkError::BranchNotFound(*source))?;
        let target_branch = self
            .store
            .branch(target)?
            .ok_or(SdkError::BranchNotFound(*target))?;
        if source_branch.campaign_id != target_branch.campaign_id {
            return Err(SdkError::InvalidOperation(format!(
                "branches {source} and {target} belong to different campaigns"
            )));
        }

        let ancestor = common_ancestor(self.store.as_ref(), source, target)?;
        let base_time = ancestor.clamp(world_time);

        let mut entities = Vec::new();
        for row in self.store.entities(&source_branch.campaign_id)? {
            let key = row.key();
            let base = self.live_state(&key, &ancestor.branch, base_time)?;
            let from_source = self.live_state(&key, source, world_time)?;
            let from_target = self.live_state(&key, target, world_time)?;
            if base.is_none() && from_source.is_none() && from_target.is_none() {
                continue;
            }

            let result = self.engine.detect_conflicts_for(
                &key.entity_type,
                base.as_ref(),
                from_source.as_ref(),
                from_target.as_ref(),
            );
            let action = plan(&result, from_target.as_ref());
            debug!(entity = %key, ?action, conflicts = result.conflicts.len(), "entity merge planned");

            entities.push(EntityMerge {
                key,
                version: row.version,
                base,
                source: from_source,
                target: from_target,
                result,
                action,
            });
        }

        Ok(MergePreview {
            source: *source,
            target: *target,
            ancestor: ancestor.branch,
            base_time,
            world_time,
            entities,
        })
    }

    /// Merge `source` into `target`, committing one snapshot per changed
    /// entity on the target branch at `world_time`.
    ///
    /// Refuses with [`SdkError::UnresolvedConflicts`] before writing anything
    /// if a conflicting entity lacks resolutions for all of its conflicts.
    /// Each entity is committed under an optimistic lock on the version seen
    /// while planning; a concurrent write surfaces as a lock conflict and
    /// leaves earlier entities of the merge committed.
    pub fn execute(
        &self,
        source: &BranchId,
        target: &BranchId,
        world_time: WorldTime,
        resolutions: &MergeResolutions,
        actor: &str,
    ) -> SdkResult<MergeReport> {
        let preview = self.preview(source, target, world_time)?;
        let campaign = self
            .store
            .branch(target)?
            .ok_or(SdkError::BranchNotFound(*target))?
            .campaign_id;

        let mut actions = Vec::with_capacity(preview.entities.len());
        let mut unresolved = Vec::new();
        for entity in &preview.entities {
            if entity.action != MergeAction::Conflicted {
                actions.push((entity, entity.action.clone()));
                continue;
            }
            let empty = Resolutions::new();
            let chosen = resolutions.get(&entity.key).unwrap_or(&empty);
            match self.engine.apply_resolutions_for(
                &entity.key.entity_type,
                entity.base.as_ref(),
                entity.source.as_ref(),
                entity.target.as_ref(),
                chosen,
            ) {
                Ok(merged) => {
                    let resolved = MergeResult::clean(merged);
                    actions.push((entity, plan(&resolved, entity.target.as_ref())));
                }
                Err(MergeError::UnresolvedConflict { .. }) => unresolved.push(entity.key.clone()),
                Err(err) => return Err(err.into()),
            }
        }

        if !unresolved.is_empty() {
            warn!(
                %source,
                %target,
                entities = unresolved.len(),
                "merge refused: unresolved conflicts"
            );
            return Err(SdkError::UnresolvedConflicts {
                count: unresolved.len(),
                entities: unresolved,
            });
        }

        let mut report = MergeReport {
            ancestor: preview.ancestor,
            base_time: preview.base_time,
            written: Vec::new(),
            deleted: 0,
            unchanged: 0,
        };
        for (entity, action) in actions {
            let payload = match action {
                MergeAction::Unchanged | MergeAction::Conflicted => {
                    report.unchanged += 1;
                    continue;
                }
                MergeAction::Write(payload) => payload,
                MergeAction::Delete => {
                    report.deleted += 1;
                    self.tombstone(entity.target.clone().unwrap_or_default(), world_time)
                }
            };
            let request = CreateVersion::new(
                entity.key.clone(),
                campaign,
                *target,
                world_time,
                payload,
                actor,
                ExpectedVersion::Exactly(entity.version),
            )
            .with_comment(format!("merge from branch {source}"));
            report.written.push(self.store.create_version(request)?);
        }

        info!(
            %source,
            %target,
            written = report.written.len(),
            deleted = report.deleted,
            unchanged = report.unchanged,
            "merge executed"
        );
        Ok(report)
    }

    /// The entity's state on `branch` at `at`, or `None` if it does not exist
    /// there or is marked deleted.
    fn live_state(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        at: WorldTime,
    ) -> SdkResult<Option<Payload>> {
        let Some(snapshot) = resolve_in_lineage(self.store.as_ref(), key, branch, at)? else {
            return Ok(None);
        };
        let payload = self.store.decompress_version(&snapshot)?;
        let deleted = payload
            .get(&self.deletion_field)
            .is_some_and(|v| !v.is_null());
        Ok((!deleted).then_some(payload))
    }

    fn tombstone(&self, mut payload: Payload, at: WorldTime) -> Payload {
        payload.insert(self.deletion_field.clone(), Value::from(at.ticks()));
        payload
    }
}

fn plan(result: &MergeResult, target: Option<&Payload>) -> MergeAction {
    if result.has_conflicts {
        return MergeAction::Conflicted;
    }
    match (&result.merged_payload, target) {
        (None, None) => MergeAction::Unchanged,
        (None, Some(_)) => MergeAction::Delete,
        (Some(merged), Some(current)) if merged == current => MergeAction::Unchanged,
        (Some(merged), _) => MergeAction::Write(merged.clone()),
    }
}
