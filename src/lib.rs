pub mod cli;
pub mod config;
pub mod directory;
pub mod flag;
pub mod proxy;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ProxyConfig;

pub fn create_router() -> Router {
    create_router_with_config(ProxyConfig::default())
}

pub fn create_router_with_config(config: ProxyConfig) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(proxy::router(config))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
