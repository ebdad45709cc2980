//! In-process stand-ins for the flag service and completion API.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const PROJECT_COUNT: usize = 250;

/// Requests seen by the mock, as `METHOD path?query`.
#[derive(Clone, Default)]
pub struct RequestLog {
    entries: Arc<Mutex<Vec<String>>>,
    authorization: Arc<Mutex<Vec<String>>>,
}

impl RequestLog {
    fn record(&self, line: String, headers: &HeaderMap) {
        self.entries.lock().unwrap().push(line);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.authorization.lock().unwrap().push(auth.to_string());
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn authorization(&self) -> Vec<String> {
        self.authorization.lock().unwrap().clone()
    }
}

/// Serve `app` on an ephemeral local port and return its origin.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn page_query(query: &HashMap<String, String>) -> (usize, usize) {
    let limit = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(20);
    let offset = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    (limit, offset)
}

fn query_string(query: &HashMap<String, String>) -> String {
    let mut pairs: Vec<_> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    pairs.join("&")
}

async fn list_projects(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    let (limit, offset) = page_query(&query);
    log.record(format!("GET /projects?offset={}", offset), &headers);
    let items: Vec<Value> = (offset..PROJECT_COUNT.min(offset + limit))
        .map(|i| json!({ "key": format!("project-{}", i), "name": format!("Project {}", i) }))
        .collect();
    Json(json!({ "items": items, "totalCount": PROJECT_COUNT }))
}

async fn list_environments(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Path(project): Path<String>,
) -> Json<Value> {
    log.record(format!("GET /projects/{}/environments", project), &headers);
    Json(json!({
        "items": [
            { "key": "production", "name": "Production" },
            { "key": "staging", "name": "Staging" }
        ],
        "totalCount": 2
    }))
}

async fn environment_detail(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Path((project, env)): Path<(String, String)>,
) -> impl IntoResponse {
    log.record(format!("GET /projects/{}/environments/{}", project, env), &headers);
    if env == "staging" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "key": env, "name": "Production", "color": "417505", "apiKey": "sdk-1" })),
    )
}

async fn list_flags(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    log.record(format!("GET /flags/{}?{}", project, query_string(&query)), &headers);
    Json(json!({
        "items": [
            {
                "key": "new-banner",
                "name": "New banner",
                "kind": "boolean",
                "variations": [
                    { "name": "On", "value": true },
                    { "name": "Off", "value": false }
                ],
                "environments": { "production": { "on": true, "experiment": false } }
            },
            {
                "key": "hero-copy",
                "name": "Hero copy",
                "kind": "string",
                "variations": [
                    { "name": "A", "value": "a" },
                    { "name": "B", "value": "b" },
                    { "name": "C", "value": "c" }
                ]
            }
        ],
        "totalCount": 2
    }))
}

async fn flag_detail(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Path((project, flag)): Path<(String, String)>,
) -> impl IntoResponse {
    log.record(format!("GET /flags/{}/{}", project, flag), &headers);
    if flag == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": "not_found", "message": "Unknown resource" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "key": flag,
            "name": "New banner",
            "kind": "boolean",
            "variations": [{ "name": "On", "value": true }, { "name": "Off", "value": false }],
            "_version": 3
        })),
    )
}

async fn create_flag(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Path(project): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    log.record(format!("POST /flags/{}", project), &headers);
    if body.get("key").and_then(Value::as_str) == Some("taken") {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "code": "conflict", "message": "A flag with this key already exists" })),
        );
    }
    // Idempotent re-creation answers 200 with the stored flag
    let status = if body.get("key").and_then(Value::as_str) == Some("existing-copy") {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    let mut created = body;
    created["creationDate"] = json!(1700000000000u64);
    (status, Json(created))
}

async fn chat_completion(
    State(log): State<RequestLog>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    log.record("POST /v1/chat/completions".to_string(), &headers);
    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or("")
        .to_string();
    let content = if last.contains("JSON array") {
        let suggestions = json!([{
            "entryTitle": "Hero",
            "hypothesis": "Shorter copy lifts clicks",
            "metrics": ["ctr", "bounce rate"]
        }]);
        format!("```json\n{}\n```", suggestions)
    } else {
        format!("You said: {}", last)
    };
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
}

/// Router mimicking the flag service REST API and a chat-completion endpoint.
pub fn flag_service(log: RequestLog) -> Router {
    Router::new()
        .route("/api/v2/projects", get(list_projects))
        .route("/api/v2/projects/:project/environments", get(list_environments))
        .route("/api/v2/projects/:project/environments/:env", get(environment_detail))
        .route("/api/v2/flags/:project", get(list_flags).post(create_flag))
        .route("/api/v2/flags/:project/:flag", get(flag_detail))
        .route("/v1/chat/completions", post(chat_completion))
        .with_state(log)
}

/// Proxy config pointed at a running mock.
pub fn proxy_config(upstream: &str) -> flaglink::config::ProxyConfig {
    let mut config = flaglink::config::ProxyConfig::default();
    config.flag_service_url = upstream.to_string();
    config.completion.url = format!("{}/v1/chat/completions", upstream);
    config.completion.api_key = Some("sk-test".to_string());
    config
}
