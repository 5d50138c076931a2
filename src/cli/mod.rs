// src/cli/mod.rs — CLI definition (clap derive)

use clap::{Parser, Subcommand};

use crate::infra::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "kimi2api",
    about = "OpenAI-compatible bridge to kimi-ai.chat",
    version
)]
pub struct Cli {
    /// Config file path (default: $KIMI2API_HOME/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level used when RUST_LOG / KIMI2API_LOG are unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Check configuration and upstream reachability, then exit
    Doctor,
}

impl Cli {
    /// Flags win over file and environment settings.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}
