//! Branch ancestry.
//!
//! A branch sees its own snapshots plus those of its ancestors, each ancestor
//! cut off at the world time where the descendant forked from it. The parent's
//! history after the fork is invisible to the child.

use std::collections::HashSet;

use lore_store::{VersionSnapshot, VersionStore};
use lore_types::{BranchId, EntityKey, WorldTime};

use crate::error::{SdkError, SdkResult};

/// One branch in a lineage and the latest world time visible through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineageStep {
    pub branch: BranchId,
    /// `None` for the starting branch itself (no cut-off).
    pub horizon: Option<WorldTime>,
}

impl LineageStep {
    /// Clamp a query time to this step's horizon.
    pub fn clamp(&self, at: WorldTime) -> WorldTime {
        match self.horizon {
            Some(horizon) => at.min(horizon),
            None => at,
        }
    }
}

/// The branch followed by its ancestors, nearest first.
pub fn lineage(store: &dyn VersionStore, branch: &BranchId) -> SdkResult<Vec<LineageStep>> {
    let mut steps = Vec::new();
    let mut seen = HashSet::new();
    let mut current = *branch;
    let mut horizon: Option<WorldTime> = None;

    loop {
        if !seen.insert(current) {
            return Err(SdkError::InvalidOperation(format!(
                "branch lineage of {branch} contains a cycle"
            )));
        }
        let record = store
            .branch(&current)?
            .ok_or(SdkError::BranchNotFound(current))?;
        steps.push(LineageStep {
            branch: current,
            horizon,
        });

        let Some(parent) = record.parent else {
            return Ok(steps);
        };
        horizon = match (horizon, record.diverged_at) {
            (Some(h), Some(d)) => Some(h.min(d)),
            (h, d) => h.or(d),
        };
        current = parent;
    }
}

/// Resolve an entity on `branch` as of `at`, falling back through the
/// branch's ancestors.
pub fn resolve_in_lineage(
    store: &dyn VersionStore,
    key: &EntityKey,
    branch: &BranchId,
    at: WorldTime,
) -> SdkResult<Option<VersionSnapshot>> {
    for step in lineage(store, branch)? {
        if let Some(snapshot) = store.resolve_version(key, &step.branch, step.clamp(at))? {
            return Ok(Some(snapshot));
        }
    }
    Ok(None)
}

/// The nearest branch shared by both lineages and the latest world time at
/// which both branches still agreed with it.
pub fn common_ancestor(
    store: &dyn VersionStore,
    left: &BranchId,
    right: &BranchId,
) -> SdkResult<LineageStep> {
    let left_steps = lineage(store, left)?;
    let right_steps = lineage(store, right)?;

    for l in &left_steps {
        if let Some(r) = right_steps.iter().find(|r| r.branch == l.branch) {
            let horizon = match (l.horizon, r.horizon) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            return Ok(LineageStep {
                branch: l.branch,
                horizon,
            });
        }
    }
    Err(SdkError::InvalidOperation(format!(
        "branches {left} and {right} share no ancestor"
    )))
}
