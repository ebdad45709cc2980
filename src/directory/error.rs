use serde_json::Value;
use std::time::Duration;

/// Error talking to the flag service itself.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("flag service returned {status}: {}", error_message(.body))]
    Status { status: u16, body: Value },
    #[error("request to flag service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from flag service: {0}")]
    Decode(String),
}

/// Error from the directory client, as seen by the editor.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("missing flag service API key")]
    MissingApiKey,
    #[error("missing or empty project key")]
    MissingProjectKey,
    #[error("request timed out after {}ms; check your network connection", .0.as_millis())]
    Timeout(Duration),
    #[error("{}", error_message(.body))]
    Upstream { status: u16, body: Value },
    #[error("received non-JSON response from server")]
    NotJson(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl DirectoryError {
    /// HTTP status reported by the server, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            DirectoryError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Human-readable message from an error body.
///
/// Looks for the `error` field written by the proxy, then `message` as
/// written by the flag service, and falls back to the raw body.
pub fn error_message(body: &Value) -> String {
    ["error", "message"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| match body {
            Value::String(s) => s.clone(),
            Value::Null => "request failed".to_string(),
            other => other.to_string(),
        })
}
