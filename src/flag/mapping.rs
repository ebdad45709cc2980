//! Conversion between persisted content mappings and display content.
//!
//! Persisted mappings are `variation index -> entry id`. The editor works
//! with `LinkedContent`, which carries the metadata needed for display.
//! An id that cannot be resolved stays as `LinkedContent::Dangling` so the
//! mapping survives the next save.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Display metadata for a content entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub entry_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl EntrySummary {
    pub fn new(entry_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
            content_type_id: None,
            content_type_name: None,
            thumbnail_url: None,
        }
    }
}

/// Content linked to one variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LinkedContent {
    Resolved(EntrySummary),
    /// The entry could not be loaded (deleted, or not visible to this user)
    Dangling {
        #[serde(rename = "entryId")]
        entry_id: String,
    },
}

impl LinkedContent {
    pub fn entry_id(&self) -> &str {
        match self {
            LinkedContent::Resolved(summary) => &summary.entry_id,
            LinkedContent::Dangling { entry_id } => entry_id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LinkedContent::Resolved(_))
    }
}

impl From<EntrySummary> for LinkedContent {
    fn from(summary: EntrySummary) -> Self {
        LinkedContent::Resolved(summary)
    }
}

/// Error resolving an entry id.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("entry {0} not found")]
    NotFound(String),
    #[error("access to entry {0} denied")]
    Forbidden(String),
    #[error("failed to resolve entry: {0}")]
    Other(String),
}

/// Looks up display metadata for content entries.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, entry_id: &str) -> Result<EntrySummary, ResolveError>;
}

/// Reduce display content to the persisted mapping.
///
/// Indices without content are absent from the result.
pub fn project(content: &BTreeMap<usize, LinkedContent>) -> BTreeMap<String, String> {
    content
        .iter()
        .map(|(index, linked)| (index.to_string(), linked.entry_id().to_string()))
        .collect()
}

/// Resolve persisted mappings into display content.
///
/// Lookups run concurrently. Keys that are not variation indices are
/// skipped; ids that fail to resolve become `Dangling`.
pub async fn hydrate(
    mappings: &BTreeMap<String, String>,
    resolver: &dyn ContentResolver,
) -> BTreeMap<usize, LinkedContent> {
    let lookups = mappings.iter().filter_map(|(key, entry_id)| {
        let Ok(index) = key.parse::<usize>() else {
            warn!("[mapping] ignoring non-index mapping key {:?}", key);
            return None;
        };
        Some(async move {
            let linked = match resolver.resolve(entry_id).await {
                Ok(summary) => LinkedContent::Resolved(summary),
                Err(e) => {
                    warn!("[mapping] variation {} -> {}: {}", index, entry_id, e);
                    LinkedContent::Dangling {
                        entry_id: entry_id.clone(),
                    }
                }
            };
            (index, linked)
        })
    });

    join_all(lookups).await.into_iter().collect()
}

/// Extract an entry id from a persisted mapping value.
///
/// Accepts plain id strings and link objects of the form
/// `{ "sys": { "id": "..." } }`.
pub fn entry_id_from_value(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(id) => id.as_str(),
        Value::Object(_) => value.get("sys")?.get("id")?.as_str()?,
        _ => return None,
    };
    (!id.is_empty()).then(|| id.to_string())
}

/// Normalize persisted mapping values to plain entry ids.
pub fn normalize_persisted(flag_details: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    flag_details
        .iter()
        .filter_map(|(index, value)| match entry_id_from_value(value) {
            Some(id) => Some((index.clone(), id)),
            None => {
                warn!("[mapping] dropping unreadable mapping for {}: {}", index, value);
                None
            }
        })
        .collect()
}
