//! Client for the flag directory proxy (`POST /api/app-action`).
//!
//! Every call carries the installation's API key and is bounded by a
//! fixed timeout. Failures are terminal: there is no retry, the caller
//! re-invokes to try again.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::error::DirectoryError;
use super::model::{CreateFlagRequest, Environment, Flag, Page, Project};
use crate::config::InstallationParameters;
use crate::flag::FlagSource;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

/// Request body accepted by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    pub api_key: String,
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

/// Response envelope returned by the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl DirectoryClient {
    /// `proxy_url` is the proxy's origin, e.g. `http://localhost:3000`.
    pub fn new(proxy_url: &str, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/api/app-action", proxy_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_installation(proxy_url: &str, params: &InstallationParameters) -> Self {
        Self::new(proxy_url, params.launch_darkly_api_key.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn projects(&self) -> Result<Vec<Project>, DirectoryError> {
        let page: Page<Project> = decode(self.call("getProjects", json!({})).await?)?;
        info!("[directory] retrieved {} projects", page.items.len());
        Ok(page.items)
    }

    pub async fn environments(
        &self,
        project_key: &str,
    ) -> Result<Vec<Environment>, DirectoryError> {
        let project_key = require_project(project_key)?;
        let page: Page<Environment> = decode(
            self.call("getEnvironments", json!({ "projectKey": project_key }))
                .await?,
        )?;
        info!("[directory] retrieved {} environments for {}", page.items.len(), project_key);
        Ok(page.items)
    }

    pub async fn flags(
        &self,
        project_key: &str,
        search: &str,
    ) -> Result<Vec<Flag>, DirectoryError> {
        let project_key = require_project(project_key)?;
        let page: Page<Flag> = decode(
            self.call(
                "getFlags",
                json!({ "projectKey": project_key, "search": search }),
            )
            .await?,
        )?;
        Ok(page.items)
    }

    pub async fn flag(&self, project_key: &str, flag_key: &str) -> Result<Flag, DirectoryError> {
        let project_key = require_project(project_key)?;
        decode(
            self.call(
                "getFlagDetails",
                json!({ "projectKey": project_key, "flagKey": flag_key }),
            )
            .await?,
        )
    }

    pub async fn create_flag(
        &self,
        project_key: &str,
        flag: &CreateFlagRequest,
    ) -> Result<Flag, DirectoryError> {
        let project_key = require_project(project_key)?;
        decode(
            self.call(
                "createFlag",
                json!({ "projectKey": project_key, "flagData": flag }),
            )
            .await?,
        )
    }

    /// Invoke one proxy action and return its body.
    pub async fn call(&self, action: &str, params: Value) -> Result<Value, DirectoryError> {
        let api_key = self.api_key.as_ref().ok_or(DirectoryError::MissingApiKey)?;
        let request = ActionRequest {
            api_key: api_key.clone(),
            action: action.to_string(),
            params,
        };

        debug!("[directory] {} via {}", action, self.endpoint);
        tokio::time::timeout(self.timeout, self.send(&request))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))?
    }

    async fn send(&self, request: &ActionRequest) -> Result<Value, DirectoryError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return Err(DirectoryError::NotJson(response.text().await?));
        }

        let envelope: ActionResponse = response.json().await?;
        if !(200..300).contains(&envelope.status) {
            return Err(DirectoryError::Upstream {
                status: envelope.status,
                body: envelope.body,
            });
        }
        Ok(envelope.body)
    }
}

#[async_trait]
impl FlagSource for DirectoryClient {
    async fn list_flags(
        &self,
        project_key: &str,
        search: &str,
    ) -> Result<Vec<Flag>, DirectoryError> {
        self.flags(project_key, search).await
    }

    async fn create_flag(
        &self,
        project_key: &str,
        flag: &CreateFlagRequest,
    ) -> Result<Flag, DirectoryError> {
        DirectoryClient::create_flag(self, project_key, flag).await
    }
}

fn require_project(project_key: &str) -> Result<&str, DirectoryError> {
    let trimmed = project_key.trim();
    if trimmed.is_empty() {
        return Err(DirectoryError::MissingProjectKey);
    }
    Ok(trimmed)
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, DirectoryError> {
    serde_json::from_value(body).map_err(|e| DirectoryError::Decode(e.to_string()))
}
