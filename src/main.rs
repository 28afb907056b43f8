mod card;
mod channels;
mod compose;
mod config;
mod llm;
mod notifier;
mod providers;
mod scheduler;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use channels::console::ConsoleChannel;
use channels::telegram::TelegramChannel;
use notifier::Notifier;
use scheduler::{DailySchedule, Trigger};

#[derive(Parser)]
#[command(
    name = "daybreak",
    version,
    about = "Daily weather and birthday digest for a Telegram chat"
)]
struct Cli {
    #[arg(short, long, default_value = "~/.daybreak/config.toml")]
    config: String,
    /// Send one message right away and exit
    #[arg(long)]
    test: bool,
    /// Hour to send at (24-hour clock, in the configured UTC offset)
    #[arg(long)]
    hour: Option<u32>,
    /// Minute to send at
    #[arg(long)]
    minute: Option<u32>,
    /// Add today's most liked holidays
    #[arg(long)]
    holidays: bool,
    /// Add a joke
    #[arg(long)]
    joke: bool,
    /// Add an LLM-written haiku
    #[arg(long)]
    hokku: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the daily target time and send (default)
    Run,
    /// Create ~/.daybreak/config.toml with commented defaults
    Init,
    /// Build today's message and print it instead of sending
    Preview,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.as_ref().unwrap_or(&Commands::Run);

    if let Commands::Init = command {
        init_logging(None)?;
        let path = config::init_config_dir().await?;
        tracing::info!("Config written to {}", path.display());
        return Ok(());
    }

    let mut cfg = config::load(&cli.config)?;
    cfg.apply_overrides(&config::Overrides {
        hour: cli.hour,
        minute: cli.minute,
        holidays: cli.holidays,
        joke: cli.joke,
        haiku: cli.hokku,
    });
    init_logging(cfg.logging.file.as_deref())?;

    match command {
        Commands::Preview => preview(&cfg).await,
        _ => run(&cfg, cli.test).await,
    }
}

async fn run(cfg: &config::Config, test: bool) -> Result<()> {
    cfg.validate()?;
    let schedule = DailySchedule::from_config(&cfg.schedule)?;
    let channel = TelegramChannel::new(&cfg.telegram)?;
    let notifier = Notifier::from_config(cfg, Box::new(channel), schedule.offset())?;
    tracing::info!("Enabled sections: {}", notifier.provider_names().join(", "));

    if test {
        match notifier.fire(Utc::now()).await {
            Ok(()) => tracing::info!("Test message sent successfully."),
            Err(e) => tracing::error!("An error occurred during testing: {e:#}"),
        }
        return Ok(());
    }

    let trigger = Trigger::new(schedule, Utc::now());
    scheduler::run(trigger, &notifier, async {
        signal::ctrl_c().await.ok();
    })
    .await;
    Ok(())
}

async fn preview(cfg: &config::Config) -> Result<()> {
    if cfg.weather.api_key.trim().is_empty() {
        tracing::warn!("No weather API key; the weather section will show the fallback text");
    }
    let schedule = DailySchedule::from_config(&cfg.schedule)?;
    let notifier = Notifier::from_config(cfg, Box::new(ConsoleChannel), schedule.offset())?;
    if let Err(e) = notifier.fire(Utc::now()).await {
        tracing::error!("Preview failed: {e:#}");
    }
    Ok(())
}

fn init_logging(file: Option<&Path>) -> Result<()> {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let file_layer = match file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let log = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(log))
                    .with_filter(EnvFilter::new("info,daybreak=debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(file_layer)
        .init();
    Ok(())
}
