//! Configuration for the proxy server and the app installation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::directory::DEFAULT_BASE_URL;

pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Proxy server settings, loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Origin of the flag service REST API
    #[serde(default = "default_flag_service_url")]
    pub flag_service_url: String,
    /// Page size used when collecting paginated listings
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout for upstream calls
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            flag_service_url: default_flag_service_url(),
            page_size: default_page_size(),
            request_timeout_ms: default_request_timeout_ms(),
            completion: CompletionConfig::default(),
        }
    }
}

impl ProxyConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Chat-completion service used for experiment suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,
    /// Read from the environment when absent
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Parameters stored with the app installation.
///
/// Hosts expose these in different places; adapters fill this one shape
/// and everything downstream reads from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationParameters {
    #[serde(default)]
    pub launch_darkly_api_key: Option<String>,
    #[serde(default)]
    pub launch_darkly_project_key: Option<String>,
}

fn default_flag_service_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    crate::directory::PAGE_SIZE
}

fn default_request_timeout_ms() -> u64 {
    8000
}

fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_tokens() -> u32 {
    600
}

fn default_temperature() -> f32 {
    0.7
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let config: ProxyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.flag_service_url, "https://app.launchdarkly.com");
        assert_eq!(config.page_size, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(8));
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.completion.max_tokens, 600);
        assert!(config.completion.api_key.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "flag_service_url": "http://localhost:9000",
            "page_size": 20,
            "request_timeout_ms": 1500,
            "completion": {
                "url": "http://localhost:9001/v1/chat/completions",
                "api_key": "sk-test",
                "model": "gpt-4o-mini",
                "max_tokens": 300,
                "temperature": 0.2
            }
        }"#;
        let config: ProxyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.flag_service_url, "http://localhost:9000");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.completion.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "page_size": 50 }}"#).unwrap();
        let config = ProxyConfig::load(file.path()).unwrap();
        assert_eq!(config.page_size, 50);

        assert!(matches!(
            ProxyConfig::load(Path::new("/nonexistent/flaglink.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_installation_parameters_wire_names() {
        // Hosts may still send an environment; nothing reads it
        let params: InstallationParameters = serde_json::from_str(
            r#"{
                "launchDarklyApiKey": "api-1",
                "launchDarklyProjectKey": "web",
                "launchDarklyEnvironment": "production"
            }"#,
        )
        .unwrap();
        assert_eq!(params.launch_darkly_api_key.as_deref(), Some("api-1"));
        assert_eq!(params.launch_darkly_project_key.as_deref(), Some("web"));
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            serde_json::json!({ "launchDarklyApiKey": "api-1", "launchDarklyProjectKey": "web" })
        );
    }
}
