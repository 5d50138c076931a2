// src/main.rs — kimi2api entry point

use std::sync::Arc;

use clap::Parser;

use kimi2api::api::{self, ApiState};
use kimi2api::cli::{Cli, Commands};
use kimi2api::core::chat::ChatService;
use kimi2api::infra::config::Config;
use kimi2api::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Respects RUST_LOG / KIMI2API_LOG
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // defaults → config.toml → environment → flags
    let mut config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };
    config.apply_env();
    cli.apply_overrides(&mut config);
    config.validate()?;

    let chat = Arc::new(ChatService::from_config(&config)?);

    match cli.command {
        Some(Commands::Doctor) => run_doctor(&config, &chat).await,
        Some(Commands::Serve) | None => {
            // A failed warm-up is retried on the first request.
            let warm = Arc::clone(&chat);
            tokio::spawn(async move { warm.nonces().warm_up().await });

            let state = ApiState::new(chat, config.server.auth_key().map(str::to_string));
            api::start_server(&config.server, state).await
        }
    }
}

async fn run_doctor(config: &Config, chat: &ChatService) -> anyhow::Result<()> {
    println!("kimi2api doctor v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Config:   ok");
    println!("  Listen:   {}:{}", config.server.host, config.server.port);
    println!(
        "  Auth:     {}",
        if config.server.auth_key().is_some() {
            "master key required"
        } else {
            "open"
        }
    );
    println!("  Models:   {}", config.models.known.join(", "));

    eprint!("  Checking nonce from {}... ", config.upstream.chat_page_url);
    match chat.nonces().get(true).await {
        Ok(_) => {
            eprintln!("ok");
            Ok(())
        }
        Err(e) => {
            eprintln!("FAILED");
            Err(e.into())
        }
    }
}
