use std::sync::Arc;

use lore_diff::{diff_payloads, PayloadDiff};
use lore_store::{CreateVersion, ExpectedVersion, VersionSnapshot, VersionStore};
use lore_types::{BranchId, EntityId, EntityKey, EntityType, Payload, WorldTime};
use serde_json::Value;
use tracing::debug;

use crate::error::{SdkError, SdkResult};
use crate::lineage::resolve_in_lineage;

/// Entity reads and writes on top of a [`VersionStore`].
///
/// Writes layer the caller's changes over the state the entity had on the
/// branch at the write's world time, then append the result as a new
/// snapshot under an optimistic lock.
#[derive(Clone)]
pub struct EntityService {
    store: Arc<dyn VersionStore>,
    deletion_field: String,
}

impl EntityService {
    pub fn new(store: Arc<dyn VersionStore>, deletion_field: impl Into<String>) -> Self {
        Self {
            store,
            deletion_field: deletion_field.into(),
        }
    }

    pub fn deletion_field(&self) -> &str {
        &self.deletion_field
    }

    /// Create a new entity on `branch` at version 1.
    pub fn create(
        &self,
        entity_type: EntityType,
        payload: Payload,
        branch: &BranchId,
        world_time: WorldTime,
        actor: &str,
    ) -> SdkResult<VersionSnapshot> {
        let record = self
            .store
            .branch(branch)?
            .ok_or(SdkError::BranchNotFound(*branch))?;
        let key = EntityKey::new(entity_type, EntityId::new());
        let request = CreateVersion::new(
            key,
            record.campaign_id,
            *branch,
            world_time,
            payload,
            actor,
            ExpectedVersion::New,
        );
        Ok(self.store.create_version(request)?)
    }

    /// Apply a shallow set of field changes.
    ///
    /// Each top-level key in `changes` replaces the stored value; keys not
    /// mentioned keep their value. Fails with a lock conflict if the entity
    /// is no longer at `expected_version`.
    pub fn update(
        &self,
        key: &EntityKey,
        changes: Payload,
        expected_version: u64,
        branch: &BranchId,
        world_time: WorldTime,
        actor: &str,
    ) -> SdkResult<VersionSnapshot> {
        let row = self.store.check_version(key, expected_version)?;

        let mut payload = self
            .get_as_of(key, branch, world_time)?
            .ok_or_else(|| SdkError::EntityNotFound(format!("{key} on branch {branch}")))?;
        payload.extend(changes);

        let request = CreateVersion::new(
            key.clone(),
            row.campaign_id,
            *branch,
            world_time,
            payload,
            actor,
            ExpectedVersion::Exactly(expected_version),
        );
        let snapshot = self.store.create_version(request)?;
        debug!(entity = %key, version = snapshot.version, "entity updated");
        Ok(snapshot)
    }

    /// Mark an entity deleted by setting the deletion field to `world_time`.
    ///
    /// Earlier snapshots stay readable at earlier world times.
    pub fn delete(
        &self,
        key: &EntityKey,
        expected_version: u64,
        branch: &BranchId,
        world_time: WorldTime,
        actor: &str,
    ) -> SdkResult<VersionSnapshot> {
        let changes = Payload::from([(
            self.deletion_field.clone(),
            Value::from(world_time.ticks()),
        )]);
        self.update(key, changes, expected_version, branch, world_time, actor)
    }

    /// The entity's state on `branch` as of `at`, including state inherited
    /// from ancestor branches up to their fork points.
    ///
    /// A deleted entity is returned with its deletion field set; see
    /// [`is_deleted`](Self::is_deleted).
    pub fn get_as_of(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        at: WorldTime,
    ) -> SdkResult<Option<Payload>> {
        resolve_in_lineage(self.store.as_ref(), key, branch, at)?
            .map(|snapshot| self.store.decompress_version(&snapshot))
            .transpose()
            .map_err(SdkError::from)
    }

    /// Like [`get_as_of`](Self::get_as_of), but a deleted entity reads as
    /// absent.
    pub fn get_live_as_of(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        at: WorldTime,
    ) -> SdkResult<Option<Payload>> {
        Ok(self
            .get_as_of(key, branch, at)?
            .filter(|payload| !self.is_deleted(payload)))
    }

    pub fn is_deleted(&self, payload: &Payload) -> bool {
        payload
            .get(&self.deletion_field)
            .is_some_and(|v| !v.is_null())
    }

    /// Snapshots of the entity written on `branch` itself, by world time.
    pub fn history(&self, key: &EntityKey, branch: &BranchId) -> SdkResult<Vec<VersionSnapshot>> {
        Ok(self.store.history(key, branch)?)
    }

    /// Field-level changes between the entity's state at `from` and at `to`
    /// on `branch`. A side where the entity did not exist counts as empty.
    pub fn diff_versions(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        from: WorldTime,
        to: WorldTime,
    ) -> SdkResult<PayloadDiff> {
        let old = self.get_as_of(key, branch, from)?.unwrap_or_default();
        let new = self.get_as_of(key, branch, to)?.unwrap_or_default();
        Ok(diff_payloads(&old, &new))
    }
}
