//! Command-line arguments for the flaglink binaries.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{ConfigError, ProxyConfig};

/// Proxy server for flag directory and suggestion requests
#[derive(Parser, Debug)]
#[command(name = "flaglink-server")]
#[command(about = "Proxy server for flag directory and suggestion requests")]
pub struct ServerArgs {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3001")]
    pub port: u16,

    /// Path to a JSON config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Flag service origin (overrides config)
    #[arg(long)]
    pub flag_service_url: Option<String>,

    /// Chat-completion endpoint (overrides config)
    #[arg(long)]
    pub completion_url: Option<String>,

    /// Chat-completion API key (overrides config)
    #[arg(long, env = "FLAGLINK_COMPLETION_API_KEY", hide_env_values = true)]
    pub completion_api_key: Option<String>,
}

impl ServerArgs {
    /// Load the config file if given, then apply command-line overrides.
    pub fn resolve_config(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::load(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(url) = &self.flag_service_url {
            config.flag_service_url = url.clone();
        }
        if let Some(url) = &self.completion_url {
            config.completion.url = url.clone();
        }
        if let Some(key) = &self.completion_api_key {
            config.completion.api_key = Some(key.clone());
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Query the flag directory through a running proxy
#[derive(Parser, Debug)]
#[command(name = "flaglink-directory")]
#[command(about = "Query the flag directory through a running proxy")]
pub struct DirectoryArgs {
    /// Proxy base URL
    #[arg(long, default_value = "http://localhost:3001")]
    pub proxy: String,

    /// Flag service API key
    #[arg(long, env = "FLAGLINK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "8000")]
    pub timeout_ms: u64,

    #[command(subcommand)]
    pub command: DirectoryCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum DirectoryCommand {
    /// List projects
    Projects,
    /// List a project's environments
    Environments { project: String },
    /// List a project's flags
    Flags {
        project: String,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show one flag
    Flag { project: String, key: String },
}
