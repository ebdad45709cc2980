//! Records returned by the flag directory.
//!
//! Only the fields the editor reads are typed; everything else is kept in
//! `extra` so records can be passed along without loss.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::flag::{Variation, VariationType};

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default, rename = "totalCount")]
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub key: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub key: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<VariationType>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub temporary: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub environments: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Flag {
    pub fn status(&self) -> FlagStatus {
        FlagStatus::from_flag(self)
    }
}

/// Whether a flag is serving and experimenting in production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagStatus {
    pub is_live: bool,
    pub is_experiment: bool,
}

impl FlagStatus {
    pub const PRODUCTION: &'static str = "production";

    pub fn from_flag(flag: &Flag) -> Self {
        let production = flag.environments.get(Self::PRODUCTION);
        let enabled = |field: &str| {
            production
                .and_then(|env| env.get(field))
                .and_then(Value::as_bool)
                .unwrap_or(false)
        };
        Self {
            is_live: enabled("on"),
            is_experiment: enabled("experiment"),
        }
    }
}

/// Payload for creating a flag upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFlagRequest {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: VariationType,
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub temporary: bool,
}
