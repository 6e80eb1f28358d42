use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::EntityId;

/// The kind of campaign entity a payload describes.
///
/// The store keeps one append-only snapshot stream per entity type; merge
/// exclusion lists may also be keyed by type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityType {
    Character,
    Party,
    Kingdom,
    Settlement,
    Structure,
    Location,
    Encounter,
    Event,
    /// Domain-specific kind not covered above.
    Custom(String),
}

impl EntityType {
    /// Stable lowercase tag used in keys, config files, and logs.
    pub fn tag(&self) -> &str {
        match self {
            Self::Character => "character",
            Self::Party => "party",
            Self::Kingdom => "kingdom",
            Self::Settlement => "settlement",
            Self::Structure => "structure",
            Self::Location => "location",
            Self::Encounter => "encounter",
            Self::Event => "event",
            Self::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "character" => Self::Character,
            "party" => Self::Party,
            "kingdom" => Self::Kingdom,
            "settlement" => Self::Settlement,
            "structure" => Self::Structure,
            "location" => Self::Location,
            "encounter" => Self::Encounter,
            "event" => Self::Event,
            "" => return Err(TypeError::UnknownEntityType(s.to_string())),
            other => Self::Custom(other.to_string()),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for EntityType {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityType> for String {
    fn from(kind: EntityType) -> Self {
        kind.tag().to_string()
    }
}

/// Addresses one entity: its type tag plus its identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_type: EntityType,
    pub entity_id: EntityId,
}

impl EntityKey {
    pub fn new(entity_type: EntityType, entity_id: EntityId) -> Self {
        Self {
            entity_type,
            entity_id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id.short_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_roundtrip_for_builtin_kinds() {
        for kind in [
            EntityType::Character,
            EntityType::Party,
            EntityType::Kingdom,
            EntityType::Settlement,
            EntityType::Structure,
            EntityType::Location,
            EntityType::Encounter,
            EntityType::Event,
        ] {
            let parsed: EntityType = kind.tag().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_tag_becomes_custom() {
        let parsed: EntityType = "artifact".parse().unwrap();
        assert_eq!(parsed, EntityType::Custom("artifact".into()));
        assert_eq!(parsed.tag(), "artifact");
    }

    #[test]
    fn empty_tag_is_rejected() {
        assert!("".parse::<EntityType>().is_err());
    }

    #[test]
    fn serializes_as_tag_string() {
        let json = serde_json::to_string(&EntityType::Party).unwrap();
        assert_eq!(json, "\"party\"");
        let custom: EntityType = serde_json::from_str("\"relic\"").unwrap();
        assert_eq!(custom, EntityType::Custom("relic".into()));
    }

    #[test]
    fn key_display_is_compact() {
        let key = EntityKey::new(EntityType::Settlement, EntityId::new());
        let shown = key.to_string();
        assert!(shown.starts_with("settlement:"));
        assert_eq!(shown.len(), "settlement:".len() + 8);
    }
}
