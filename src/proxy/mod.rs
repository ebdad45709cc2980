//! Backend proxy: forwards directory calls and completion requests on
//! behalf of the editor, which cannot reach either service directly.

pub mod app_action;
pub mod suggest;

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::config::ProxyConfig;

pub use app_action::{Action, AppActionRequest, ProxyError};
pub use suggest::{ChatMessage, SuggestError, Suggestion};

#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<ProxyConfig>,
    pub http: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: ProxyConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("[proxy] Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self {
            config: Arc::new(config),
            http,
        }
    }
}

pub fn router(config: ProxyConfig) -> Router {
    let state = ProxyState::new(config);

    Router::new()
        .route("/api/app-action", post(app_action::app_action))
        .route("/api/openai-suggest", post(suggest::suggest))
        .route("/api/openai-suggest-chat", post(suggest::suggest_chat))
        .with_state(state)
}
