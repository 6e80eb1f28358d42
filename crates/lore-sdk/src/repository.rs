use std::sync::Arc;

use lore_merge::MergeEngine;
use lore_store::{InMemoryVersionStore, VersionStore};

use crate::branch::BranchService;
use crate::config::LoreConfig;
use crate::entity::EntityService;
use crate::error::SdkResult;
use crate::merge::MergeOrchestrator;

/// High-level Lore API: one version store plus the services built on it.
#[derive(Clone)]
pub struct Lore {
    store: Arc<dyn VersionStore>,
    config: LoreConfig,
}

impl Lore {
    /// An in-memory instance with default configuration.
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(InMemoryVersionStore::new()),
            config: LoreConfig::default(),
        }
    }

    /// An in-memory instance tuned by `config`.
    pub fn with_config(config: LoreConfig) -> SdkResult<Self> {
        config.validate()?;
        let store = InMemoryVersionStore::with_config(config.store.clone());
        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    /// Wrap an existing store backend.
    pub fn with_store(store: Arc<dyn VersionStore>, config: LoreConfig) -> SdkResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    pub fn config(&self) -> &LoreConfig {
        &self.config
    }

    pub fn entities(&self) -> EntityService {
        EntityService::new(Arc::clone(&self.store), self.config.deletion_field.clone())
    }

    pub fn branches(&self) -> BranchService {
        BranchService::new(Arc::clone(&self.store))
    }

    pub fn merges(&self) -> MergeOrchestrator {
        MergeOrchestrator::new(
            Arc::clone(&self.store),
            MergeEngine::new(self.config.merge.clone()),
            self.config.deletion_field.clone(),
        )
    }
}
