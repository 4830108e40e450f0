mod commands;
mod logging;
mod protocol;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reevo::config::AgentConfig;

use logging::LogFormat;

#[derive(Parser)]
#[command(author, version, about = "Reevo voice agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the voice activity and turn detection model files
    #[command(name = "download-files")]
    DownloadFiles,

    /// Chat with the agent from the terminal
    Console,

    /// Run the agent worker with readable debug logs
    Dev,

    /// Run the agent worker with JSON logs
    Start,
}

impl Command {
    fn log_format(&self) -> (LogFormat, &'static str) {
        match self {
            Command::DownloadFiles => (LogFormat::Pretty, "info"),
            Command::Console => (LogFormat::Pretty, "warn"),
            Command::Dev => (LogFormat::Pretty, "debug"),
            Command::Start => (LogFormat::Json, "info"),
        }
    }
}

/// `.env.local` is read first so its values win, nothing overrides the real environment
fn load_env_files() {
    for file in [".env.local", ".env"] {
        if let Err(e) = dotenv::from_filename(file) {
            if !e.not_found() {
                eprintln!("Could not read {}: {}", file, e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_files();
    let cli = Cli::parse();

    let (format, default_level) = cli.command.log_format();
    logging::init(format, default_level)?;

    let config = AgentConfig::from_env().context("Invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Command::DownloadFiles => commands::download_files::run(&config).await,
        Command::Console => commands::console::run(&config).await,
        Command::Dev | Command::Start => commands::worker::run(&config).await,
    }
}
