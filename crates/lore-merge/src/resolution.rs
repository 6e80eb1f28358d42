use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A caller's choice for one conflicting path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the ancestor's value.
    Base,
    /// Take the source branch's value.
    Source,
    /// Take the target branch's value.
    Target,
    /// Use an explicit value. At the entity level it must be an object.
    Value(Value),
    /// Drop the field (or, at the entity level, delete the entity).
    Remove,
}

impl Resolution {
    /// Pick the chosen value among the three sides.
    pub fn choose(
        &self,
        base: Option<&Value>,
        source: Option<&Value>,
        target: Option<&Value>,
    ) -> Option<Value> {
        match self {
            Self::Base => base.cloned(),
            Self::Source => source.cloned(),
            Self::Target => target.cloned(),
            Self::Value(v) => Some(v.clone()),
            Self::Remove => None,
        }
    }
}

/// Resolutions keyed by conflict path (`""` for the entity as a whole).
pub type Resolutions = BTreeMap<String, Resolution>;
