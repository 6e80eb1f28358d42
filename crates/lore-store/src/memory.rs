use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use lore_types::{
    check_keys, BranchId, CampaignId, EntityId, EntityKey, EntityType, Payload, SnapshotId,
    WorldTime,
};
use tracing::debug;

use crate::codec::{compress_payload, decompress_payload};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{BranchRecord, CreateVersion, EntityRecord, VersionSnapshot};
use crate::traits::{compare_versions, VersionStore};

/// In-memory version store.
///
/// Intended for tests and embedding. The entity, branch, and snapshot tables
/// live behind a single `RwLock`; a write holds the guard for the whole
/// compare-and-swap plus insert, which makes each `create_version` atomic.
/// Payload compression happens before the guard is taken.
pub struct InMemoryVersionStore {
    config: StoreConfig,
    inner: RwLock<StoreState>,
}

/// `(entity id, branch id)` addressing one snapshot stream within a type.
type StreamKey = (EntityId, BranchId);

#[derive(Default)]
struct StoreState {
    branches: HashMap<BranchId, BranchRecord>,
    entities: HashMap<EntityKey, EntityRecord>,
    /// One append-only collection per entity type; each stream sorted by
    /// `(valid_from, version)`.
    snapshots: HashMap<EntityType, HashMap<StreamKey, Vec<VersionSnapshot>>>,
}

impl StoreState {
    fn stream(&self, key: &EntityKey, branch: &BranchId) -> Option<&Vec<VersionSnapshot>> {
        self.snapshots
            .get(&key.entity_type)?
            .get(&(key.entity_id, *branch))
    }

    fn insert_snapshot(&mut self, snapshot: VersionSnapshot) {
        let stream = self
            .snapshots
            .entry(snapshot.entity_type.clone())
            .or_default()
            .entry((snapshot.entity_id, snapshot.branch_id))
            .or_default();
        let at = stream.partition_point(|s| s.order_key() <= snapshot.order_key());
        stream.insert(at, snapshot);
    }

    fn snapshot_count(&self) -> usize {
        self.snapshots
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }
}

impl InMemoryVersionStore {
    /// Create an empty store with default settings.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with explicit settings.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(StoreState::default()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Total number of snapshots across all entity types and branches.
    pub fn snapshot_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.snapshot_count())
    }

    /// Number of entity rows.
    pub fn entity_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.entities.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Default for InMemoryVersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionStore for InMemoryVersionStore {
    fn create_branch(&self, branch: &BranchRecord) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.branches.contains_key(&branch.id) {
            return Err(StoreError::BadRequest(format!(
                "branch {} already exists",
                branch.id
            )));
        }

        if let Some(parent_id) = branch.parent {
            let parent = state
                .branches
                .get(&parent_id)
                .ok_or_else(|| StoreError::not_found("branch", parent_id))?;
            if parent.campaign_id != branch.campaign_id {
                return Err(StoreError::BadRequest(format!(
                    "parent branch {parent_id} belongs to another campaign"
                )));
            }
            if branch.diverged_at.is_none() {
                return Err(StoreError::BadRequest(format!(
                    "branch {} has a parent but no divergence time",
                    branch.name
                )));
            }
        }

        debug!(branch = %branch.id, name = %branch.name, parent = ?branch.parent, "branch created");
        state.branches.insert(branch.id, branch.clone());
        Ok(())
    }

    fn branch(&self, id: &BranchId) -> StoreResult<Option<BranchRecord>> {
        Ok(self.read()?.branches.get(id).cloned())
    }

    fn branches(&self, campaign: &CampaignId) -> StoreResult<Vec<BranchRecord>> {
        let state = self.read()?;
        let mut branches: Vec<BranchRecord> = state
            .branches
            .values()
            .filter(|b| b.campaign_id == *campaign)
            .cloned()
            .collect();
        branches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(branches)
    }

    fn entity(&self, key: &EntityKey) -> StoreResult<Option<EntityRecord>> {
        Ok(self.read()?.entities.get(key).cloned())
    }

    fn entities(&self, campaign: &CampaignId) -> StoreResult<Vec<EntityRecord>> {
        let state = self.read()?;
        let mut rows: Vec<EntityRecord> = state
            .entities
            .values()
            .filter(|row| row.campaign_id == *campaign)
            .cloned()
            .collect();
        rows.sort_by_key(EntityRecord::key);
        Ok(rows)
    }

    fn create_version(&self, request: CreateVersion) -> StoreResult<VersionSnapshot> {
        let key = request.key();
        if let Some(valid_to) = request.valid_to {
            if valid_to <= request.valid_from {
                return Err(StoreError::BadRequest(format!(
                    "valid_to {valid_to} is not after valid_from {}",
                    request.valid_from
                )));
            }
        }

        check_keys(&request.payload)?;
        let compressed = compress_payload(&request.payload, self.config.compression_level)?;

        let mut state = self.write()?;

        let branch_campaign = state
            .branches
            .get(&request.branch_id)
            .map(|b| b.campaign_id)
            .ok_or_else(|| StoreError::not_found("branch", request.branch_id))?;
        if branch_campaign != request.campaign_id {
            return Err(StoreError::BadRequest(format!(
                "branch {} does not belong to campaign {}",
                request.branch_id, request.campaign_id
            )));
        }

        let row = state.entities.get(&key);
        if let Some(row) = row {
            if row.campaign_id != request.campaign_id {
                return Err(StoreError::BadRequest(format!(
                    "entity {key} belongs to campaign {}",
                    row.campaign_id
                )));
            }
        }
        if let Err(err) = compare_versions(&key, request.expected_version, row) {
            debug!(entity = %key, branch = %request.branch_id, error = %err, "write rejected");
            return Err(err);
        }
        let version = row.map_or(1, |r| r.version + 1);

        let now = Utc::now();
        let snapshot = VersionSnapshot {
            id: SnapshotId::new(),
            entity_type: request.entity_type.clone(),
            entity_id: request.entity_id,
            branch_id: request.branch_id,
            valid_from: request.valid_from,
            valid_to: request.valid_to,
            payload: compressed,
            version,
            comment: request.comment,
            created_by: request.actor,
            created_at: now,
        };

        // All checks passed; both writes land under the same guard.
        state.entities.insert(
            key.clone(),
            EntityRecord {
                entity_type: request.entity_type,
                entity_id: request.entity_id,
                campaign_id: request.campaign_id,
                version,
                state: request.payload,
                updated_at: now,
            },
        );
        state.insert_snapshot(snapshot.clone());

        debug!(
            entity = %key,
            branch = %snapshot.branch_id,
            version,
            valid_from = %snapshot.valid_from,
            digest = %snapshot.payload.short_digest(),
            "version created"
        );
        Ok(snapshot)
    }

    fn resolve_version(
        &self,
        key: &EntityKey,
        branch: &BranchId,
        at: WorldTime,
    ) -> StoreResult<Option<VersionSnapshot>> {
        let state = self.read()?;
        let Some(stream) = state.stream(key, branch) else {
            return Ok(None);
        };
        let idx = stream.partition_point(|s| s.valid_from <= at);
        Ok(idx.checked_sub(1).map(|i| stream[i].clone()))
    }

    fn history(&self, key: &EntityKey, branch: &BranchId) -> StoreResult<Vec<VersionSnapshot>> {
        let state = self.read()?;
        Ok(state.stream(key, branch).cloned().unwrap_or_default())
    }

    fn decompress_version(&self, snapshot: &VersionSnapshot) -> StoreResult<Payload> {
        decompress_payload(&snapshot.payload, self.config.verify_digest)
    }
}

impl std::fmt::Debug for InMemoryVersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (entities, snapshots) = match self.read() {
            Ok(state) => (state.entities.len(), state.snapshot_count()),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryVersionStore")
            .field("entity_count", &entities)
            .field("snapshot_count", &snapshots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decompress_version;
    use crate::record::ExpectedVersion;
    use lore_types::{payload_from_value, Payload};
    use serde_json::{json, Value};

    struct Fixture {
        store: InMemoryVersionStore,
        campaign: CampaignId,
        main: BranchRecord,
    }

    fn fixture() -> Fixture {
        let store = InMemoryVersionStore::new();
        let campaign = CampaignId::new();
        let main = BranchRecord::root(campaign, "main", "gm");
        store.create_branch(&main).unwrap();
        Fixture {
            store,
            campaign,
            main,
        }
    }

    fn payload(value: Value) -> Payload {
        payload_from_value(value).unwrap()
    }

    fn t(ticks: i64) -> WorldTime {
        WorldTime::from_ticks(ticks)
    }

    fn settlement() -> EntityKey {
        EntityKey::new(EntityType::Settlement, EntityId::new())
    }

    fn write(
        fx: &Fixture,
        key: &EntityKey,
        branch: BranchId,
        at: i64,
        body: Value,
        expected: ExpectedVersion,
    ) -> StoreResult<VersionSnapshot> {
        fx.store.create_version(CreateVersion::new(
            key.clone(),
            fx.campaign,
            branch,
            t(at),
            payload(body),
            "gm",
            expected,
        ))
    }

    // -----------------------------------------------------------------------
    // create_version
    // -----------------------------------------------------------------------

    #[test]
    fn first_write_creates_entity_at_version_one() {
        let fx = fixture();
        let key = settlement();
        let snap = write(&fx, &key, fx.main.id, 10, json!({"name": "Fort"}), ExpectedVersion::New)
            .unwrap();

        assert_eq!(snap.version, 1);
        assert_eq!(snap.created_by, "gm");
        let row = fx.store.entity(&key).unwrap().expect("row should exist");
        assert_eq!(row.version, 1);
        assert_eq!(row.state, payload(json!({"name": "Fort"})));
        assert_eq!(fx.store.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn each_write_increments_version_and_appends_one_snapshot() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({"level": 1}), ExpectedVersion::New).unwrap();
        write(&fx, &key, fx.main.id, 20, json!({"level": 2}), ExpectedVersion::Exactly(1)).unwrap();
        let third =
            write(&fx, &key, fx.main.id, 30, json!({"level": 3}), ExpectedVersion::Exactly(2))
                .unwrap();

        assert_eq!(third.version, 3);
        assert_eq!(fx.store.current_version(&key).unwrap(), 3);
        assert_eq!(fx.store.history(&key, &fx.main.id).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_a_lock_conflict() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({"level": 1}), ExpectedVersion::New).unwrap();
        write(&fx, &key, fx.main.id, 20, json!({"level": 2}), ExpectedVersion::Exactly(1)).unwrap();

        let err = write(&fx, &key, fx.main.id, 30, json!({"level": 9}), ExpectedVersion::Exactly(1))
            .unwrap_err();
        match err {
            StoreError::OptimisticLockConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected OptimisticLockConflict, got {other:?}"),
        }
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({"level": 1}), ExpectedVersion::New).unwrap();
        let _ = write(&fx, &key, fx.main.id, 20, json!({"level": 5}), ExpectedVersion::Exactly(7));

        let row = fx.store.entity(&key).unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(row.state, payload(json!({"level": 1})));
        assert_eq!(fx.store.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn creating_an_existing_entity_conflicts() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({}), ExpectedVersion::New).unwrap();
        let err = write(&fx, &key, fx.main.id, 11, json!({}), ExpectedVersion::New).unwrap_err();
        assert!(matches!(
            err,
            StoreError::OptimisticLockConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn updating_a_missing_entity_is_not_found() {
        let fx = fixture();
        let err = write(&fx, &settlement(), fx.main.id, 10, json!({}), ExpectedVersion::Exactly(1))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { what: "entity", .. }));
    }

    #[test]
    fn unknown_branch_is_not_found() {
        let fx = fixture();
        let err = write(&fx, &settlement(), BranchId::new(), 10, json!({}), ExpectedVersion::New)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { what: "branch", .. }));
    }

    #[test]
    fn branch_from_another_campaign_is_bad_request() {
        let fx = fixture();
        let foreign = BranchRecord::root(CampaignId::new(), "elsewhere", "gm");
        fx.store.create_branch(&foreign).unwrap();

        let err = write(&fx, &settlement(), foreign.id, 10, json!({}), ExpectedVersion::New)
            .unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
        assert_eq!(fx.store.entity_count().unwrap(), 0);
    }

    #[test]
    fn entity_from_another_campaign_is_bad_request() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({}), ExpectedVersion::New).unwrap();

        let other_campaign = CampaignId::new();
        let other_main = BranchRecord::root(other_campaign, "main", "gm");
        fx.store.create_branch(&other_main).unwrap();
        let err = fx
            .store
            .create_version(CreateVersion::new(
                key,
                other_campaign,
                other_main.id,
                t(20),
                Payload::new(),
                "gm",
                ExpectedVersion::Exactly(1),
            ))
            .unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[test]
    fn ambiguous_keys_are_bad_request() {
        let fx = fixture();
        let key = settlement();
        for body in [
            Payload::from([("id.note".to_string(), json!("z"))]),
            Payload::from([("a".to_string(), json!({"b.c": 1}))]),
            Payload::from([(String::new(), json!(1))]),
        ] {
            let err = fx
                .store
                .create_version(CreateVersion::new(
                    key.clone(),
                    fx.campaign,
                    fx.main.id,
                    t(10),
                    body,
                    "gm",
                    ExpectedVersion::New,
                ))
                .unwrap_err();
            assert!(matches!(err, StoreError::BadRequest(_)), "{err}");
        }
        assert_eq!(fx.store.entity_count().unwrap(), 0);
    }

    #[test]
    fn inverted_interval_is_bad_request() {
        let fx = fixture();
        let err = fx
            .store
            .create_version(
                CreateVersion::new(
                    settlement(),
                    fx.campaign,
                    fx.main.id,
                    t(10),
                    Payload::new(),
                    "gm",
                    ExpectedVersion::New,
                )
                .with_valid_to(t(10)),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[test]
    fn valid_to_and_comment_are_recorded_as_given() {
        let fx = fixture();
        let snap = fx
            .store
            .create_version(
                CreateVersion::new(
                    settlement(),
                    fx.campaign,
                    fx.main.id,
                    t(10),
                    Payload::new(),
                    "gm",
                    ExpectedVersion::New,
                )
                .with_valid_to(t(50))
                .with_comment("founded"),
            )
            .unwrap();
        assert_eq!(snap.valid_to, Some(t(50)));
        assert_eq!(snap.comment.as_deref(), Some("founded"));
    }

    // -----------------------------------------------------------------------
    // resolve_version
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_between_t2_and_t3_returns_t2_snapshot() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 100, json!({"n": 1}), ExpectedVersion::New).unwrap();
        let t2 = write(&fx, &key, fx.main.id, 200, json!({"n": 2}), ExpectedVersion::Exactly(1))
            .unwrap();
        write(&fx, &key, fx.main.id, 300, json!({"n": 3}), ExpectedVersion::Exactly(2)).unwrap();

        let found = fx.store.resolve_version(&key, &fx.main.id, t(250)).unwrap().unwrap();
        assert_eq!(found.id, t2.id);
        assert_eq!(decompress_version(&found).unwrap(), payload(json!({"n": 2})));
    }

    #[test]
    fn resolve_before_and_after_second_write() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({"p": 1}), ExpectedVersion::New).unwrap();
        write(&fx, &key, fx.main.id, 20, json!({"p": 2}), ExpectedVersion::Exactly(1)).unwrap();

        let between = fx.store.resolve_version(&key, &fx.main.id, t(15)).unwrap().unwrap();
        assert_eq!(fx.store.decompress_version(&between).unwrap(), payload(json!({"p": 1})));

        let at_t2 = fx.store.resolve_version(&key, &fx.main.id, t(20)).unwrap().unwrap();
        assert_eq!(fx.store.decompress_version(&at_t2).unwrap(), payload(json!({"p": 2})));

        let after = fx.store.resolve_version(&key, &fx.main.id, t(1_000)).unwrap().unwrap();
        assert_eq!(fx.store.decompress_version(&after).unwrap(), payload(json!({"p": 2})));
    }

    #[test]
    fn resolve_before_creation_is_none() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({}), ExpectedVersion::New).unwrap();
        assert!(fx.store.resolve_version(&key, &fx.main.id, t(9)).unwrap().is_none());
    }

    #[test]
    fn resolve_ignores_valid_to() {
        let fx = fixture();
        let key = settlement();
        fx.store
            .create_version(
                CreateVersion::new(
                    key.clone(),
                    fx.campaign,
                    fx.main.id,
                    t(10),
                    payload(json!({"p": 1})),
                    "gm",
                    ExpectedVersion::New,
                )
                .with_valid_to(t(20)),
            )
            .unwrap();
        let found = fx.store.resolve_version(&key, &fx.main.id, t(25)).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn out_of_order_world_times_still_resolve_by_valid_from() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 300, json!({"n": "late"}), ExpectedVersion::New).unwrap();
        write(&fx, &key, fx.main.id, 100, json!({"n": "early"}), ExpectedVersion::Exactly(1))
            .unwrap();

        let history = fx.store.history(&key, &fx.main.id).unwrap();
        let froms: Vec<i64> = history.iter().map(|s| s.valid_from.ticks()).collect();
        assert_eq!(froms, [100, 300]);

        let mid = fx.store.resolve_version(&key, &fx.main.id, t(200)).unwrap().unwrap();
        assert_eq!(decompress_version(&mid).unwrap(), payload(json!({"n": "early"})));
    }

    #[test]
    fn same_valid_from_resolves_to_highest_version() {
        let fx = fixture();
        let key = settlement();
        write(&fx, &key, fx.main.id, 10, json!({"n": 1}), ExpectedVersion::New).unwrap();
        write(&fx, &key, fx.main.id, 10, json!({"n": 2}), ExpectedVersion::Exactly(1)).unwrap();

        let found = fx.store.resolve_version(&key, &fx.main.id, t(10)).unwrap().unwrap();
        assert_eq!(found.version, 2);
    }

    #[test]
    fn branches_are_independent_streams() {
        let fx = fixture();
        let key = settlement();
        let alt = BranchRecord::child(&fx.main, "alt", t(5), "gm");
        fx.store.create_branch(&alt).unwrap();

        write(&fx, &key, fx.main.id, 10, json!({"side": "main"}), ExpectedVersion::New).unwrap();
        write(&fx, &key, alt.id, 10, json!({"side": "alt"}), ExpectedVersion::Exactly(1)).unwrap();

        let on_main = fx.store.resolve_version(&key, &fx.main.id, t(10)).unwrap().unwrap();
        let on_alt = fx.store.resolve_version(&key, &alt.id, t(10)).unwrap().unwrap();
        assert_eq!(decompress_version(&on_main).unwrap()["side"], json!("main"));
        assert_eq!(decompress_version(&on_alt).unwrap()["side"], json!("alt"));
        assert_eq!(fx.store.history(&key, &alt.id).unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Branch table
    // -----------------------------------------------------------------------

    #[test]
    fn child_branch_needs_known_parent() {
        let fx = fixture();
        let orphan_parent = BranchRecord::root(fx.campaign, "ghost", "gm");
        let child = BranchRecord::child(&orphan_parent, "child", t(1), "gm");
        let err = fx.store.create_branch(&child).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { what: "branch", .. }));
    }

    #[test]
    fn child_branch_needs_divergence_time() {
        let fx = fixture();
        let mut child = BranchRecord::child(&fx.main, "child", t(1), "gm");
        child.diverged_at = None;
        let err = fx.store.create_branch(&child).unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[test]
    fn duplicate_branch_is_rejected() {
        let fx = fixture();
        let err = fx.store.create_branch(&fx.main).unwrap_err();
        assert!(matches!(err, StoreError::BadRequest(_)));
    }

    #[test]
    fn branches_are_listed_per_campaign() {
        let fx = fixture();
        let alt = BranchRecord::child(&fx.main, "alt", t(1), "gm");
        fx.store.create_branch(&alt).unwrap();
        fx.store
            .create_branch(&BranchRecord::root(CampaignId::new(), "other", "gm"))
            .unwrap();

        let names: Vec<String> = fx
            .store
            .branches(&fx.campaign)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"main".to_string()));
        assert!(names.contains(&"alt".to_string()));
    }

    #[test]
    fn entities_are_listed_per_campaign() {
        let fx = fixture();
        write(&fx, &settlement(), fx.main.id, 1, json!({}), ExpectedVersion::New).unwrap();
        write(&fx, &settlement(), fx.main.id, 1, json!({}), ExpectedVersion::New).unwrap();
        assert_eq!(fx.store.entities(&fx.campaign).unwrap().len(), 2);
        assert!(fx.store.entities(&CampaignId::new()).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_with_same_expected_version_have_one_winner() {
        use std::sync::Arc;
        use std::thread;

        let fx = Arc::new(fixture());
        let key = settlement();
        write(&fx, &key, fx.main.id, 0, json!({"n": 0}), ExpectedVersion::New).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fx = Arc::clone(&fx);
                let key = key.clone();
                thread::spawn(move || {
                    write(&fx, &key, fx.main.id, 10 + i, json!({"n": i}), ExpectedVersion::Exactly(1))
                })
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_lock_conflict()))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(fx.store.current_version(&key).unwrap(), 2);
        assert_eq!(fx.store.history(&key, &fx.main.id).unwrap().len(), 2);
    }

    #[test]
    fn check_version_gate() {
        let fx = fixture();
        let key = settlement();
        let err = fx.store.check_version(&key, 1).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { what: "entity", .. }));
        write(&fx, &key, fx.main.id, 0, json!({}), ExpectedVersion::New).unwrap();

        assert_eq!(fx.store.check_version(&key, 1).unwrap().version, 1);
        let err = fx.store.check_version(&key, 3).unwrap_err();
        assert!(err.is_lock_conflict());
        assert!(err.to_string().contains("expected version 3"));
        assert!(err.to_string().contains("actual version 1"));
    }

    #[test]
    fn debug_format() {
        let fx = fixture();
        let debug = format!("{:?}", fx.store);
        assert!(debug.contains("InMemoryVersionStore"));
        assert!(debug.contains("snapshot_count"));
    }
}
