//! Experiment suggestions from a chat-completion service.
//!
//! `POST /api/openai-suggest` turns a list of content entries into
//! structured test ideas. `POST /api/openai-suggest-chat` continues a
//! conversation with the entries as context. Both are stateless and
//! surface every failure as a 500 with a message.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::ProxyState;
use crate::config::CompletionConfig;

const SYSTEM_PROMPT: &str = "You are an expert product manager and experimentation strategist.";
const CHAT_SYSTEM_PROMPT: &str = "You are an expert product manager and experimentation \
strategist. You help users design and analyze A/B tests for their content.";
const NO_REPLY: &str = "No response from AI.";
const MAX_FIELD_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    #[error("No entries provided.")]
    NoEntries,
    #[error("Completion API key not configured.")]
    NotConfigured,
    #[error("Completion API error")]
    Api { details: String },
    #[error("Failed to parse AI response")]
    Unparseable { raw: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl IntoResponse for SuggestError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            SuggestError::NoEntries => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            SuggestError::Api { details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "details": details }),
            ),
            SuggestError::Unparseable { raw } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "raw": raw }),
            ),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": message })),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One suggested experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub entry_title: String,
    pub hypothesis: String,
    #[serde(default)]
    pub metrics: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub entries: Option<Vec<Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub entries: Vec<Value>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

pub async fn suggest(
    State(state): State<ProxyState>,
    Json(request): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, SuggestError> {
    let entries = request.entries.unwrap_or_default();
    if entries.is_empty() {
        return Err(SuggestError::NoEntries);
    }

    let prompt = format!(
        "Given the following content entries from our CMS:\n{}\n\n\
         For each entry, suggest an A/B or multivariate test we could run, with a clear \
         hypothesis and 2-3 recommended metrics for each. Respond as a JSON array of objects \
         with keys: entryTitle, hypothesis, metrics.",
        summarize_titles(&entries)
    );
    let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

    let content = complete(&state, &messages).await?.unwrap_or_default();
    debug!("[suggest] raw completion: {}", content);
    let suggestions = parse_suggestions(&content)?;
    Ok(Json(SuggestResponse { suggestions }))
}

pub async fn suggest_chat(
    State(state): State<ProxyState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, SuggestError> {
    let summary = summarize_fields(&request.entries);
    let system = if summary.is_empty() {
        CHAT_SYSTEM_PROMPT.to_string()
    } else {
        format!("{}\n{}", CHAT_SYSTEM_PROMPT, summary)
    };

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(ChatMessage::system(system));
    messages.extend(request.messages);

    let reply = complete(&state, &messages)
        .await?
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| NO_REPLY.to_string());
    Ok(Json(ChatResponse { reply }))
}

/// Send a chat completion and return the first choice's content.
async fn complete(
    state: &ProxyState,
    messages: &[ChatMessage],
) -> Result<Option<String>, SuggestError> {
    let config: &CompletionConfig = &state.config.completion;
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(SuggestError::NotConfigured)?;

    let response = state
        .http
        .post(&config.url)
        .bearer_auth(api_key)
        .json(&json!({
            "model": config.model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let details = response.text().await?;
        warn!("[suggest] completion API error: {}", details);
        return Err(SuggestError::Api { details });
    }

    let data: Value = response.json().await?;
    Ok(data
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Parse the model's reply, tolerating a fenced code block around the JSON.
pub fn parse_suggestions(content: &str) -> Result<Vec<Suggestion>, SuggestError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(body.trim()).map_err(|_| SuggestError::Unparseable {
        raw: content.to_string(),
    })
}

/// `1. Title: "...", Description: "..."` per entry.
pub fn summarize_titles(entries: &[Value]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let fields = entry.get("fields");
            let title = fields
                .and_then(|f| f.get("title"))
                .map(Value::to_string)
                .unwrap_or_else(|| "Untitled".to_string());
            let description = fields
                .and_then(|f| f.get("description"))
                .map(|d| format!(", Description: {}", d))
                .unwrap_or_default();
            format!("{}. Title: {}{}", i + 1, title, description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `Entry 1 (type: article): title: ..., body: ...` per entry, with
/// localized values unwrapped and long values truncated.
pub fn summarize_fields(entries: &[Value]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let content_type = entry
                .pointer("/sys/contentType/sys/id")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let fields = entry
                .get("fields")
                .and_then(Value::as_object)
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(name, value)| {
                            format!("{}: {}", name, display_value(unwrap_locale(value)))
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            format!("Entry {} (type: {}): {}", i + 1, content_type, fields)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{ "en-US": v }` becomes `v`; anything else is returned as is.
pub fn unwrap_locale(value: &Value) -> &Value {
    match value.as_object() {
        Some(map) if map.len() == 1 => match map.iter().next() {
            Some((locale, inner)) if is_locale_code(locale) => inner,
            _ => value,
        },
        _ => value,
    }
}

fn is_locale_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 5
        && bytes[..2].iter().all(u8::is_ascii_lowercase)
        && bytes[2] == b'-'
        && bytes[3..].iter().all(u8::is_ascii_uppercase)
}

fn display_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_FIELD_CHARS {
        let truncated: String = text.chars().take(MAX_FIELD_CHARS).collect();
        format!("{}...", truncated)
    } else {
        text
    }
}
