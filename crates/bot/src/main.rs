//! `pixelbot` serves channel commands over a persistent gateway session.
//!
//! Usage:
//!   DISCORD_BOT_TOKEN=... PB_CONFIG=config.toml pixelbot
//!
//! Env vars:
//!   PB_CONFIG          config file path (default: config.toml)
//!   DISCORD_BOT_TOKEN  bot token (name configurable via discord.token_env)
//!   RUST_LOG           overrides logging.level

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use pb_domain::config::{Config, ConfigSeverity, LoggingConfig};
use pb_session::GatewayClientBuilder;

use pb_bot::cli::{Cli, Command, ConfigCommand};
use pb_bot::commands::CommandTable;
use pb_bot::indicator::Indicator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to run when no subcommand is given.
        None | Some(Command::Run) => {
            let (config, config_path) = pb_bot::cli::load_config()?;
            init_tracing(&config.logging);
            run_bot(config, config_path).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = pb_bot::cli::load_config()?;
            if !pb_bot::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = pb_bot::cli::load_config()?;
            pb_bot::cli::config::show(&config)
        }
        Some(Command::Version) => {
            println!("pixelbot {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Install the global subscriber.  `RUST_LOG` wins over `logging.level`.
fn init_tracing(cfg: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if cfg.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_bot(config: Config, config_path: String) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in issues.iter().filter(|i| i.severity == ConfigSeverity::Warning) {
        tracing::warn!(field = %issue.field, "{}", issue.message);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .map(|i| i.to_string())
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid config {config_path}:\n{}", errors.join("\n"));
    }

    let token = config
        .discord
        .resolve_token()
        .with_context(|| format!("env var {} is unset", config.discord.token_env))?;

    let client = GatewayClientBuilder::from_config(&config, token)
        .build()
        .context("building gateway client")?;
    let handle = client.handle();

    let online = handle.clone();
    let indicator = Arc::new(Indicator::new());
    let commands = CommandTable::with_builtins(Arc::new(handle.clone()), indicator)?
        .with_online_check(move || online.is_ready());

    tracing::info!(
        config = %config_path,
        channel_id = %config.discord.channel_id,
        commands = commands.len(),
        "pixelbot starting"
    );

    let mut task = client.spawn(Arc::new(commands));

    tokio::select! {
        result = &mut task => {
            result.context("gateway task panicked")?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            tracing::info!("interrupt received, shutting down");
        }
    }

    handle.shutdown();
    task.await.context("gateway task panicked")?;
    tracing::info!("pixelbot stopped");
    Ok(())
}
