//! flaglink-directory: query the flag directory through a running proxy
//!
//! Usage:
//!   flaglink-directory --api-key api-... projects
//!   flaglink-directory flags web --search banner
//!   flaglink-directory flag web new-banner

use clap::Parser;
use flaglink::cli::{DirectoryArgs, DirectoryCommand};
use flaglink::directory::DirectoryClient;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = DirectoryArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = DirectoryClient::new(&args.proxy, args.api_key.clone())
        .with_timeout(Duration::from_millis(args.timeout_ms));

    let output = match &args.command {
        DirectoryCommand::Projects => serde_json::to_value(client.projects().await?)?,
        DirectoryCommand::Environments { project } => {
            serde_json::to_value(client.environments(project).await?)?
        }
        DirectoryCommand::Flags { project, search } => {
            serde_json::to_value(client.flags(project, search).await?)?
        }
        DirectoryCommand::Flag { project, key } => {
            serde_json::to_value(client.flag(project, key).await?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
