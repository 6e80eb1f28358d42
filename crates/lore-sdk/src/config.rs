use std::path::Path;

use lore_types::PATH_SEPARATOR;
use lore_merge::MergeConfig;
use lore_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Top-level configuration, usually loaded from a `lore.toml` file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoreConfig {
    /// Payload field whose non-null value marks an entity as deleted.
    pub deletion_field: String,
    pub store: StoreConfig,
    pub merge: MergeConfig,
}

impl Default for LoreConfig {
    fn default() -> Self {
        Self {
            deletion_field: "deletedAt".to_string(),
            store: StoreConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl LoreConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.deletion_field.is_empty() {
            return Err(SdkError::Config("deletion_field must not be empty".into()));
        }
        if self.deletion_field.contains(PATH_SEPARATOR) {
            return Err(SdkError::Config(format!(
                "deletion_field {:?} must be a top-level field name",
                self.deletion_field
            )));
        }
        if !(1..=22).contains(&self.store.compression_level) {
            return Err(SdkError::Config(format!(
                "store.compression_level {} is outside 1..=22",
                self.store.compression_level
            )));
        }
        Ok(())
    }
}
