//! Form state for one entry's flag linkage.
//!
//! `FlagFormState` is the editable representation; `PersistedEntry` is the
//! shape stored in the entry's fields. The two differ only in how content
//! mappings are stored: older entries hold link objects instead of plain ids.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

use super::mapping;

/// Maximum length for flag keys and names accepted by the flag service.
pub const MAX_FLAG_FIELD_LEN: usize = 100;

/// Which workflow the editor is in. `Unset` is stored as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagMode {
    /// No workflow chosen yet
    #[default]
    Unset,
    /// Creating a new flag upstream
    New,
    /// Linking a flag that already exists upstream
    Existing,
}

impl FlagMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagMode::Unset => "unset",
            FlagMode::New => "new",
            FlagMode::Existing => "existing",
        }
    }
}

impl Serialize for FlagMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlagMode::Unset => serializer.serialize_none(),
            mode => serializer.serialize_str(mode.as_str()),
        }
    }
}

impl std::fmt::Display for FlagMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value domain of a flag's variations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationType {
    #[default]
    Boolean,
    String,
    Number,
    Json,
}

impl VariationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationType::Boolean => "boolean",
            VariationType::String => "string",
            VariationType::Number => "number",
            VariationType::Json => "json",
        }
    }

    /// Whether `value` belongs to this type's domain.
    ///
    /// JSON variations accept objects and arrays directly, or strings that
    /// parse as JSON.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            VariationType::Boolean => value.is_boolean(),
            VariationType::String => value.is_string(),
            VariationType::Number => value.as_f64().is_some_and(|n| n.is_finite()),
            VariationType::Json => match value {
                Value::Object(_) | Value::Array(_) => true,
                Value::String(s) => serde_json::from_str::<Value>(s).is_ok(),
                _ => false,
            },
        }
    }

    /// Scaffold variations offered when a flag of this type is started.
    pub fn default_variations(&self) -> Vec<Variation> {
        match self {
            VariationType::Boolean => Variation::boolean_defaults(),
            VariationType::String => vec![
                Variation::new("Variation 1", Value::String(String::new())),
                Variation::new("Variation 2", Value::String(String::new())),
            ],
            VariationType::Number => vec![
                Variation::new("Variation 1", Value::from(0)),
                Variation::new("Variation 2", Value::from(1)),
            ],
            VariationType::Json => vec![
                Variation::new("Variation 1", Value::Object(Default::default())),
                Variation::new("Variation 2", Value::Object(Default::default())),
            ],
        }
    }
}

impl std::fmt::Display for VariationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flag variation. Its position in the list is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub name: String,
    pub value: Value,
}

impl Variation {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// The canonical `[True: true, False: false]` pair.
    pub fn boolean_defaults() -> Vec<Variation> {
        vec![
            Variation::new("True", Value::Bool(true)),
            Variation::new("False", Value::Bool(false)),
        ]
    }
}

/// Editable flag linkage for a single entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagFormState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Immutable once the flag exists upstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: FlagMode,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variation_type: VariationType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub project_key: Option<String>,
    #[serde(default)]
    pub existing_flag_key: Option<String>,
    /// Variation index (as a string) to content entry id
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_mappings: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temporary: bool,
}

impl FlagFormState {
    /// An empty form for the given mode, keeping only the project key.
    pub fn reset_for(mode: FlagMode, project_key: Option<String>) -> Self {
        Self {
            mode,
            project_key,
            ..Self::default()
        }
    }

    /// No name, key, description or variations.
    pub fn is_empty(&self) -> bool {
        is_blank(self.name.as_deref())
            && is_blank(self.key.as_deref())
            && is_blank(self.description.as_deref())
            && self.variations.is_empty()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Build form state from persisted entry fields.
    ///
    /// Entries saved before the mode field existed but already carrying a
    /// key are treated as linked to an existing flag.
    pub fn from_persisted(entry: &PersistedEntry) -> Self {
        let key = non_blank(entry.key.clone());
        let mode = match entry.mode {
            FlagMode::Unset if key.is_some() => FlagMode::Existing,
            mode => mode,
        };

        Self {
            name: non_blank(entry.name.clone()),
            key,
            description: non_blank(entry.description.clone()),
            mode,
            variation_type: entry.variation_type,
            variations: entry.variations.clone(),
            project_key: entry.project_key.clone(),
            existing_flag_key: entry.existing_flag_key.clone(),
            content_mappings: mapping::normalize_persisted(&entry.flag_details),
            tags: entry.tags.clone(),
            temporary: entry.temporary,
        }
    }

    /// Fields to write back to the entry.
    pub fn to_persisted(&self) -> PersistedEntry {
        PersistedEntry {
            name: Some(self.name().to_string()),
            key: Some(self.key().to_string()),
            description: Some(self.description().to_string()),
            variations: self.variations.clone(),
            flag_details: self
                .content_mappings
                .iter()
                .map(|(index, entry_id)| (index.clone(), Value::String(entry_id.clone())))
                .collect(),
            mode: self.mode,
            project_key: self.project_key.clone(),
            variation_type: self.variation_type,
            tags: self.tags.clone(),
            temporary: self.temporary,
            existing_flag_key: self.existing_flag_key.clone(),
        }
    }
}

/// Entry fields as stored by the host content model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variations: Vec<Variation>,
    /// Content mappings; values are entry ids or legacy `{ "sys": { "id" } }` links
    #[serde(default, deserialize_with = "null_as_default")]
    pub flag_details: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mode: FlagMode,
    #[serde(default)]
    pub project_key: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub variation_type: VariationType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub temporary: bool,
    #[serde(default)]
    pub existing_flag_key: Option<String>,
}

/// Flag keys start with an alphanumeric and contain only `[A-Za-z0-9-_.]`.
pub fn validate_flag_key(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphanumeric()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && key.len() <= MAX_FLAG_FIELD_LEN
}

pub fn validate_flag_name(name: &str) -> bool {
    !name.is_empty() && name.chars().count() <= MAX_FLAG_FIELD_LEN
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
