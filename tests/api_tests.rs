mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::RequestLog;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

// Helper to create test app with no reachable upstream
fn create_app() -> axum::Router {
    flaglink::create_router()
}

// Helper to create test app backed by a mock flag service
async fn create_app_with_upstream() -> (axum::Router, RequestLog) {
    let log = RequestLog::default();
    let upstream = common::spawn(common::flag_service(log.clone())).await;
    let app = flaglink::create_router_with_config(common::proxy_config(&upstream));
    (app, log)
}

// Helper to get response body as string
async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = body_to_string(response.into_body()).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let app = create_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_to_string(response.into_body()).await;
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_missing_api_key_rejected() {
    let (status, body) = post_json(
        create_app(),
        "/api/app-action",
        json!({ "action": "getProjects", "params": {} }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "status": 400, "body": { "error": "Missing API key" } }));
}

#[tokio::test]
async fn test_unknown_action_rejected() {
    let (status, body) = post_json(
        create_app(),
        "/api/app-action",
        json!({ "apiKey": "api-123", "action": "deleteFlag", "params": {} }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["body"]["error"], "Unknown action");
}

#[tokio::test]
async fn test_missing_params_rejected() {
    let (status, body) = post_json(
        create_app(),
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "getFlagDetails",
            "params": { "projectKey": "web" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["body"]["error"], "Missing flagKey or projectKey");

    let (status, body) = post_json(
        create_app(),
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "createFlag",
            "params": { "projectKey": "web", "flagData": { "name": "Banner", "key": "banner" } }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["body"]["error"],
        "Missing required flag fields: name, key, kind, variations"
    );
}

#[tokio::test]
async fn test_projects_collected_across_pages() {
    let (app, log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({ "apiKey": "api-123", "action": "getProjects", "params": {} }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 200);
    let items = body["body"]["items"].as_array().unwrap();
    assert_eq!(items.len(), common::PROJECT_COUNT);
    assert_eq!(items[0]["key"], "project-0");
    assert_eq!(items[249]["key"], "project-249");
    assert_eq!(body["body"]["totalCount"], 250);

    assert_eq!(
        log.matching("GET /projects?"),
        vec![
            "GET /projects?offset=0",
            "GET /projects?offset=100",
            "GET /projects?offset=200",
        ]
    );
    // `api-` keys are sent without a scheme
    assert!(log.authorization().iter().all(|a| a == "api-123"));
}

#[tokio::test]
async fn test_bearer_authorization_for_other_keys() {
    let (app, log) = create_app_with_upstream().await;

    let (status, _) = post_json(
        app,
        "/api/app-action",
        json!({ "apiKey": "oauth-token", "action": "getFlags", "params": { "projectKey": "web" } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(log.authorization(), vec!["Bearer oauth-token"]);
}

#[tokio::test]
async fn test_environment_detail_falls_back_to_summary() {
    let (app, log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "getEnvironments",
            "params": { "projectKey": "web" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let items = body["body"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["color"], "417505");
    assert_eq!(items[0]["apiKey"], "sdk-1");
    assert_eq!(items[1], json!({ "key": "staging", "name": "Staging" }));
    assert_eq!(log.matching("GET /projects/web/environments/").len(), 2);
}

#[tokio::test]
async fn test_flag_search_filter_forwarded() {
    let (app, log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "getFlags",
            "params": { "projectKey": "web", "search": "banner" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(
        log.entries(),
        vec!["GET /flags/web?filter=query:banner&limit=100&offset=0"]
    );
}

#[tokio::test]
async fn test_upstream_error_passed_through() {
    let (app, _log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "getFlagDetails",
            "params": { "projectKey": "web", "flagKey": "missing" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({ "status": 404, "body": { "code": "not_found", "message": "Unknown resource" } })
    );
}

#[tokio::test]
async fn test_create_flag() {
    let (app, log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "createFlag",
            "params": {
                "projectKey": "web",
                "flagData": {
                    "name": "New banner",
                    "key": "new-banner",
                    "kind": "boolean",
                    "variations": [
                        { "name": "On", "value": true },
                        { "name": "Off", "value": false }
                    ]
                }
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], 201);
    assert_eq!(body["body"]["key"], "new-banner");
    assert_eq!(body["body"]["creationDate"], 1700000000000u64);
    assert_eq!(log.entries(), vec!["POST /flags/web"]);
}

#[tokio::test]
async fn test_unreachable_upstream_is_server_error() {
    let mut config = flaglink::config::ProxyConfig::default();
    config.flag_service_url = "http://127.0.0.1:9".to_string();
    let app = flaglink::create_router_with_config(config);

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({ "apiKey": "api-123", "action": "getProjects", "params": {} }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
    assert!(body["body"]["error"].is_string());
}

#[tokio::test]
async fn test_suggest_requires_entries() {
    let (status, body) =
        post_json(create_app(), "/api/openai-suggest", json!({ "entries": [] })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "No entries provided." }));
}

#[tokio::test]
async fn test_suggest_without_api_key() {
    let (status, body) = post_json(
        create_app(),
        "/api/openai-suggest",
        json!({ "entries": [{ "fields": { "title": "Hero" } }] }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_suggest_parses_fenced_reply() {
    let (app, log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/openai-suggest",
        json!({ "entries": [{ "fields": { "title": "Hero", "description": "Top banner" } }] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "suggestions": [{
                "entryTitle": "Hero",
                "hypothesis": "Shorter copy lifts clicks",
                "metrics": ["ctr", "bounce rate"]
            }]
        })
    );
    assert_eq!(log.authorization(), vec!["Bearer sk-test"]);
}

#[tokio::test]
async fn test_suggest_chat_reply() {
    let (app, _log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/openai-suggest-chat",
        json!({
            "entries": [{
                "sys": { "contentType": { "sys": { "id": "hero" } } },
                "fields": { "title": { "en-US": "Hero" } }
            }],
            "messages": [{ "role": "user", "content": "What should we test?" }]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "reply": "You said: What should we test?" }));
}

#[tokio::test]
async fn test_malformed_body_gets_envelope() {
    let response = create_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/app-action")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
    assert_eq!(body["status"], 500);
    assert!(body["body"]["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_create_flag_forwards_upstream_status() {
    let (app, _log) = create_app_with_upstream().await;

    let (status, body) = post_json(
        app,
        "/api/app-action",
        json!({
            "apiKey": "api-123",
            "action": "createFlag",
            "params": {
                "projectKey": "web",
                "flagData": {
                    "name": "Existing copy",
                    "key": "existing-copy",
                    "kind": "boolean",
                    "variations": [
                        { "name": "On", "value": true },
                        { "name": "Off", "value": false }
                    ]
                }
            }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 200);
    assert_eq!(body["body"]["key"], "existing-copy");
}
