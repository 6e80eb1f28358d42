use chrono::{DateTime, Utc};
use lore_types::{
    BranchId, CampaignId, EntityId, EntityKey, EntityType, Payload, SnapshotId, WorldTime,
};
use serde::{Deserialize, Serialize};

use crate::codec::CompressedPayload;

/// Immutable record of an entity's full state at one world time on one branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub id: SnapshotId,
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub branch_id: BranchId,
    /// World time from which this state holds.
    pub valid_from: WorldTime,
    /// World time at which this state stops holding, as supplied by the
    /// writer. Resolution does not rely on it.
    pub valid_to: Option<WorldTime>,
    /// Compact form of the entity payload; see [`crate::decompress_version`].
    pub payload: CompressedPayload,
    /// Entity version this snapshot was written at.
    pub version: u64,
    pub comment: Option<String>,
    pub created_by: String,
    /// Wall-clock audit stamp.
    pub created_at: DateTime<Utc>,
}

impl VersionSnapshot {
    /// The entity this snapshot belongs to.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id)
    }

    /// Sort key within one `(entity, branch)` stream.
    pub fn order_key(&self) -> (WorldTime, u64) {
        (self.valid_from, self.version)
    }
}

/// One row of the entity table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    /// Owning scope; branches used with this entity must share it.
    pub campaign_id: CampaignId,
    /// Compare-and-swap token, incremented on every committed write.
    pub version: u64,
    /// Most recently written payload, on whichever branch.
    pub state: Payload,
    pub updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id)
    }
}

/// One row of the branch table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub id: BranchId,
    pub campaign_id: CampaignId,
    pub name: String,
    /// Branch this one forked from; `None` for a campaign's root branch.
    pub parent: Option<BranchId>,
    /// World time at which this branch forked from its parent. The parent's
    /// history after this instant is not part of this branch's lineage.
    pub diverged_at: Option<WorldTime>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl BranchRecord {
    /// A root branch for `campaign`.
    pub fn root(campaign_id: CampaignId, name: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            id: BranchId::new(),
            campaign_id,
            name: name.into(),
            parent: None,
            diverged_at: None,
            created_by: actor.into(),
            created_at: Utc::now(),
        }
    }

    /// A child of `parent` forking at world time `diverged_at`.
    pub fn child(
        parent: &BranchRecord,
        name: impl Into<String>,
        diverged_at: WorldTime,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: BranchId::new(),
            campaign_id: parent.campaign_id,
            name: name.into(),
            parent: Some(parent.id),
            diverged_at: Some(diverged_at),
            created_by: actor.into(),
            created_at: Utc::now(),
        }
    }
}

/// What the writer believes the entity's current version to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// The entity must not exist yet; it is created at version 1.
    New,
    /// The entity must currently be at exactly this version.
    Exactly(u64),
}

impl ExpectedVersion {
    /// The numeric version reported in a lock conflict (`0` for `New`).
    pub fn as_u64(&self) -> u64 {
        match self {
            Self::New => 0,
            Self::Exactly(v) => *v,
        }
    }
}

/// A write request: the entity-row update plus the snapshot to append.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateVersion {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
    pub campaign_id: CampaignId,
    pub branch_id: BranchId,
    pub valid_from: WorldTime,
    pub valid_to: Option<WorldTime>,
    pub payload: Payload,
    pub actor: String,
    pub comment: Option<String>,
    pub expected_version: ExpectedVersion,
}

impl CreateVersion {
    pub fn new(
        key: EntityKey,
        campaign_id: CampaignId,
        branch_id: BranchId,
        valid_from: WorldTime,
        payload: Payload,
        actor: impl Into<String>,
        expected_version: ExpectedVersion,
    ) -> Self {
        Self {
            entity_type: key.entity_type,
            entity_id: key.entity_id,
            campaign_id,
            branch_id,
            valid_from,
            valid_to: None,
            payload,
            actor: actor.into(),
            comment: None,
            expected_version,
        }
    }

    pub fn with_valid_to(mut self, valid_to: WorldTime) -> Self {
        self.valid_to = Some(valid_to);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_type.clone(), self.entity_id)
    }
}
