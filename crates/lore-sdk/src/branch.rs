use std::sync::Arc;

use lore_store::{BranchRecord, VersionStore};
use lore_types::{BranchId, CampaignId, WorldTime};
use tracing::info;

use crate::error::{SdkError, SdkResult};
use crate::lineage::{lineage, LineageStep};

/// Branch creation and lookup.
#[derive(Clone)]
pub struct BranchService {
    store: Arc<dyn VersionStore>,
}

impl BranchService {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// Create the first branch of a campaign.
    pub fn create_root(
        &self,
        campaign: CampaignId,
        name: &str,
        actor: &str,
    ) -> SdkResult<BranchRecord> {
        let record = BranchRecord::root(campaign, name, actor);
        self.store.create_branch(&record)?;
        info!(branch = %record.id, %campaign, name, "root branch created");
        Ok(record)
    }

    /// Fork `parent` at `diverged_at`. The new branch inherits the parent's
    /// state as of that world time.
    pub fn fork(
        &self,
        campaign: CampaignId,
        parent: &BranchId,
        name: &str,
        diverged_at: WorldTime,
        actor: &str,
    ) -> SdkResult<BranchRecord> {
        let parent = self.get(parent)?;
        if parent.campaign_id != campaign {
            return Err(SdkError::InvalidOperation(format!(
                "branch {} does not belong to campaign {campaign}",
                parent.id
            )));
        }
        let record = BranchRecord::child(&parent, name, diverged_at, actor);
        self.store.create_branch(&record)?;
        info!(
            branch = %record.id,
            parent = %parent.id,
            %diverged_at,
            name,
            "branch forked"
        );
        Ok(record)
    }

    /// Look up a branch, failing if it does not exist.
    pub fn get(&self, id: &BranchId) -> SdkResult<BranchRecord> {
        self.store.branch(id)?.ok_or(SdkError::BranchNotFound(*id))
    }

    pub fn list(&self, campaign: &CampaignId) -> SdkResult<Vec<BranchRecord>> {
        Ok(self.store.branches(campaign)?)
    }

    pub fn lineage(&self, id: &BranchId) -> SdkResult<Vec<LineageStep>> {
        lineage(self.store.as_ref(), id)
    }
}
