//! flaglink-server: proxy for flag directory and suggestion requests
//!
//! Usage:
//!   flaglink-server --port 3001
//!   flaglink-server --config flaglink.json --completion-api-key sk-...

use clap::Parser;
use flaglink::cli::ServerArgs;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match args.resolve_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("[server] Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("[server] Flag service: {}", config.flag_service_url);
    if config.completion.api_key.is_none() {
        tracing::warn!("[server] No completion API key; suggestion endpoints will fail");
    }

    let app = flaglink::create_router_with_config(config);

    let addr = args.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("[server] Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("[server] Listening on {}", addr);

    let shutdown = async {
        let _ = signal::ctrl_c().await;
        tracing::info!("[server] Received Ctrl+C, shutting down");
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("[server] Server error: {}", e);
        std::process::exit(1);
    }
}
