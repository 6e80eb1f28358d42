use lore_types::{BranchId, CampaignId, EntityKey, Payload, WorldTime};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::record::{BranchRecord, CreateVersion, EntityRecord, ExpectedVersion, VersionSnapshot};

/// Temporal, branch-aware version store.
///
/// All implementations must satisfy these invariants:
/// - `create_version` commits the entity-row version bump and the snapshot
///   insert as one atomic unit; on any error nothing is written.
/// - For a fixed `(entity, branch)`, snapshots are totally ordered by
///   `(valid_from, version)`.
/// - `resolve_version` returns the snapshot with the greatest
///   `valid_from <= at` on exactly the given branch.
/// - Version mismatches surface as [`StoreError::OptimisticLockConflict`] and
///   are never retried by the store.
pub trait VersionStore: Send + Sync {
    /// Register a branch. A child branch's parent must exist and belong to the
    /// same campaign.
    fn create_branch(&self, branch: &BranchRecord) -> StoreResult<()>;

    /// Look up a branch. Returns `Ok(None)` if it does not exist.
    fn branch(&self, id: &BranchId) -> StoreResult<Option<BranchRecord>>;

    /// All branches of a campaign, oldest first.
    fn branches(&self, campaign: &CampaignId) -> StoreResult<Vec<BranchRecord>>;

    /// Read an entity row. Returns `Ok(None)` if it does not exist.
    fn entity(&self, key: &EntityKey) -> StoreResult<Option<EntityRecord>>;

    /// All entity rows of a campaign, ordered by key.
    fn entities(&self, campaign: &CampaignId) -> StoreResult<Vec<EntityRecord>>;

    /// Atomically update the entity row and append a new snapshot.
    ///
    /// Fails with `NotFound` for an unknown branch (or an unknown entity when
    /// a specific version is expected), `BadRequest` when the branch and
    /// entity belong to different campaigns, and `OptimisticLockConflict`
    /// when the expected version is stale.
    fn create_version(&self, request: CreateVersion) -> StoreResult<VersionSnapshot>;

    /// The snapshot current as of `at` on `branch`, or `Ok(None)` if the
    /// entity did not exist on that branch at that time.
    fn resolve_version(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        at: WorldTime,
    ) -> StoreResult<Option<VersionSnapshot>>;

    /// Every snapshot of the entity on the branch, ordered by `valid_from`.
    fn history(&self, key: &EntityKey, branch: &BranchId) -> StoreResult<Vec<VersionSnapshot>>;

    /// Restore a snapshot's payload.
    fn decompress_version(&self, snapshot: &VersionSnapshot) -> StoreResult<Payload> {
        codec::decompress_version(snapshot)
    }

    /// The entity's current version.
    fn current_version(&self, key: &EntityKey) -> StoreResult<u64> {
        self.entity(key)?
            .map(|row| row.version)
            .ok_or_else(|| StoreError::not_found("entity", key))
    }

    /// Fast-fail concurrency gate run by callers before building an update.
    ///
    /// Returns the current row when the entity exists at exactly `expected`.
    /// `create_version` repeats the comparison inside its atomic unit.
    fn check_version(&self, key: &EntityKey, expected: u64) -> StoreResult<EntityRecord> {
        let row = self
            .entity(key)?
            .ok_or_else(|| StoreError::not_found("entity", key))?;
        compare_versions(key, ExpectedVersion::Exactly(expected), Some(&row))?;
        Ok(row)
    }
}

/// Compare an expected version against the current entity row.
pub(crate) fn compare_versions(
    key: &EntityKey,
    expected: ExpectedVersion,
    row: Option<&EntityRecord>,
) -> StoreResult<()> {
    match (expected, row) {
        (ExpectedVersion::New, None) => Ok(()),
        (ExpectedVersion::Exactly(_), None) => Err(StoreError::not_found("entity", key)),
        (ExpectedVersion::Exactly(v), Some(row)) if row.version == v => Ok(()),
        (expected, Some(row)) => Err(StoreError::OptimisticLockConflict {
            entity: key.to_string(),
            expected: expected.as_u64(),
            actual: row.version,
        }),
    }
}
