use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;

mod cli;
mod config;

use crate::config::{ChatConfig, ClientDirs, FileConfig};

#[derive(Parser)]
#[command(name = "meet-chat")]
#[command(about = "Chat with the meeting assistant and get a meeting link")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom config directory (defaults to ~/.meet-chat)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Assistant service WebSocket URL (overrides config.toml and env)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant (default)
    Chat(ChatArgs),

    /// Print the resolved configuration
    Config,
}

#[derive(Parser, Default)]
struct ChatArgs {
    /// Start a new session whenever the connection drops
    #[arg(long)]
    reconnect: bool,
}

fn init_logging(dirs: &ClientDirs, debug: bool) -> Result<()> {
    let default_directive = if debug {
        "meet_chat=debug,assistant_session=debug,info"
    } else {
        "meet_chat=info,assistant_session=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    // stdout is the chat surface, so logs go to a file.
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dirs.log_path())
        .with_context(|| format!("Failed to open log file: {:?}", dirs.log_path()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file)),
        )
        .with(env_filter)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = ClientDirs::new(cli.config_dir.clone())?;
    init_logging(&dirs, cli.debug)?;

    let file_config: FileConfig = config::load_config(&dirs.config_dir)
        .extract()
        .with_context(|| format!("Invalid configuration in {:?}", dirs.config_toml_path()))?;

    match cli.command {
        Some(Commands::Config) => {
            let mut resolved = file_config.clone();
            if let Some(url) = &cli.url {
                resolved.server.url = url.clone();
            }
            cli::config_command(&resolved)
        }
        Some(Commands::Chat(args)) => run_chat(&file_config, cli.url.as_deref(), args).await,
        None => run_chat(&file_config, cli.url.as_deref(), ChatArgs::default()).await,
    }
}

async fn run_chat(file_config: &FileConfig, url: Option<&str>, args: ChatArgs) -> Result<()> {
    let config = ChatConfig::from_file(file_config, url, args.reconnect)?;
    info!(url = %config.url, reconnect = config.reconnect.enabled, "starting meet-chat");
    cli::chat_command(&config).await
}
