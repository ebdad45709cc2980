//! `POST /api/app-action`: authorize and forward directory calls.
//!
//! The body is `{ apiKey, action, params }` and the reply is
//! `{ status, body }` with the same HTTP status. Upstream errors pass
//! through unchanged.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{info, warn};

use super::ProxyState;
use crate::directory::{ActionResponse, FlagService, UpstreamError};

/// Actions the proxy forwards. Anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetFlags,
    GetEnvironments,
    GetProjects,
    GetFlagDetails,
    CreateFlag,
}

impl FromStr for Action {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "getFlags" => Ok(Action::GetFlags),
            "getEnvironments" => Ok(Action::GetEnvironments),
            "getProjects" => Ok(Action::GetProjects),
            "getFlagDetails" => Ok(Action::GetFlagDetails),
            "createFlag" => Ok(Action::CreateFlag),
            other => Err(ProxyError::UnknownAction(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppActionRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Missing API key")]
    MissingApiKey,
    #[error("Unknown action")]
    UnknownAction(String),
    #[error("Missing {0}")]
    MissingParams(&'static str),
    #[error("Missing required flag fields: name, key, kind, variations")]
    MissingFlagFields,
    #[error("{0}")]
    InvalidBody(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingApiKey
            | ProxyError::UnknownAction(_)
            | ProxyError::MissingParams(_)
            | ProxyError::MissingFlagFields => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(UpstreamError::Status { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ProxyError::InvalidBody(_) | ProxyError::Upstream(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ProxyError::Upstream(UpstreamError::Status { body, .. }) => body,
            other => json!({ "error": other.to_string() }),
        };
        envelope(status, body)
    }
}

pub async fn app_action(
    State(state): State<ProxyState>,
    payload: Result<Json<AppActionRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("[proxy] unreadable request: {}", rejection.body_text());
            return ProxyError::InvalidBody(rejection.body_text()).into_response();
        }
    };
    let action_name = request.action.clone();
    match dispatch(&state, request).await {
        Ok((status, body)) => envelope(status, body),
        Err(e) => {
            warn!("[proxy] {} failed: {}", action_name, e);
            e.into_response()
        }
    }
}

async fn dispatch(
    state: &ProxyState,
    request: AppActionRequest,
) -> Result<(StatusCode, Value), ProxyError> {
    let api_key = request
        .api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(ProxyError::MissingApiKey)?;
    let action: Action = request.action.parse()?;
    let params = request.params;
    let service = state.flag_service(&api_key);

    match action {
        Action::GetProjects => {
            let reply = service.list_projects().await?;
            info!("[proxy] getProjects -> {} projects", reply.body.items.len());
            Ok((forwarded(reply.status), to_body(reply.body)))
        }
        Action::GetEnvironments => {
            let project_key = require_param(&params, "projectKey")?;
            let reply = service.list_environments(project_key).await?;
            info!(
                "[proxy] getEnvironments {} -> {} environments",
                project_key,
                reply.body.items.len()
            );
            Ok((forwarded(reply.status), to_body(reply.body)))
        }
        Action::GetFlags => {
            let project_key = require_param(&params, "projectKey")?;
            let search = string_param(&params, "search").unwrap_or("");
            let reply = service.list_flags(project_key, search).await?;
            info!("[proxy] getFlags {} -> {} flags", project_key, reply.body.items.len());
            Ok((forwarded(reply.status), to_body(reply.body)))
        }
        Action::GetFlagDetails => {
            let (Some(project_key), Some(flag_key)) = (
                string_param(&params, "projectKey"),
                string_param(&params, "flagKey"),
            ) else {
                return Err(ProxyError::MissingParams("flagKey or projectKey"));
            };
            let reply = service.flag_details(project_key, flag_key).await?;
            Ok((forwarded(reply.status), reply.body))
        }
        Action::CreateFlag => {
            let (Some(project_key), Some(flag_data)) =
                (string_param(&params, "projectKey"), params.get("flagData"))
            else {
                return Err(ProxyError::MissingParams("projectKey or flagData"));
            };
            if !has_required_flag_fields(flag_data) {
                return Err(ProxyError::MissingFlagFields);
            }
            let reply = service.create_flag(project_key, flag_data).await?;
            info!(
                "[proxy] createFlag {} in {} -> {}",
                reply.body.get("key").unwrap_or(&serde_json::Value::Null),
                project_key,
                reply.status
            );
            Ok((forwarded(reply.status), reply.body))
        }
    }
}

impl ProxyState {
    fn flag_service(&self, api_key: &str) -> FlagService {
        FlagService::new(self.http.clone(), &self.config.flag_service_url, api_key)
            .with_page_size(self.config.page_size)
    }
}

/// `name`, `key`, `kind` and `variations` must be present and non-empty.
fn has_required_flag_fields(flag: &Value) -> bool {
    let present = |field: &str| match flag.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    present("name")
        && present("key")
        && present("kind")
        && flag.get("variations").is_some_and(Value::is_array)
}

fn forwarded(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

fn require_param<'a>(params: &'a Value, name: &'static str) -> Result<&'a str, ProxyError> {
    string_param(params, name).ok_or(ProxyError::MissingParams(name))
}

fn string_param<'a>(params: &'a Value, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

fn to_body<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn envelope(status: StatusCode, body: Value) -> Response {
    (
        status,
        Json(ActionResponse {
            status: status.as_u16(),
            body,
        }),
    )
        .into_response()
}
