//! Bizbot - Event-driven bot framework for business messaging platforms
//!
//! A small CLI around the library: run a bot that logs every inbound
//! event, or print configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use bizbot::{Bot, BotConfig, Credentials};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bizbot")]
#[command(author = "Bizbot Team")]
#[command(version)]
#[command(about = "Event-driven bot framework for business messaging platforms")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BIZBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bot that logs every inbound event
    Run {
        /// Account (shop) identifier to operate as
        #[arg(long, env = "BIZBOT_ACCOUNT")]
        account: String,

        /// Login email; requires BIZBOT_PASSWORD in the environment
        #[arg(long, env = "BIZBOT_EMAIL")]
        email: Option<String>,

        /// Raw cookie string captured from an authenticated browser session
        #[arg(long, env = "BIZBOT_COOKIES", conflicts_with = "email")]
        cookies: Option<String>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("bizbot={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        BotConfig::default()
    };

    match cli.command {
        Commands::Run {
            account,
            email,
            cookies,
        } => {
            let credentials = build_credentials(account, email, cookies)?;
            run_bot(config, credentials).await?;
        }
        Commands::Config { default } => {
            let shown = if default { BotConfig::default() } else { config };
            println!("{}", toml::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn build_credentials(
    account: String,
    email: Option<String>,
    cookies: Option<String>,
) -> Result<Credentials> {
    if let Some(cookies) = cookies {
        return Ok(Credentials::Cookie { cookies, account });
    }
    if let Some(email) = email {
        let Ok(secret) = std::env::var("BIZBOT_PASSWORD") else {
            bail!("BIZBOT_PASSWORD must be set when logging in with --email");
        };
        return Ok(Credentials::Password {
            email,
            secret,
            account,
        });
    }
    bail!("either --email or --cookies is required");
}

async fn run_bot(config: BotConfig, credentials: Credentials) -> Result<()> {
    let bot = Arc::new(
        Bot::builder()
            .credentials(credentials)
            .config(config)
            .build()?,
    );

    // Log every event, including unclassified shapes.
    bot.handle_fn(None, None, |_ctx, event| async move {
        tracing::info!(
            event_id = %event.id,
            category = %event.category,
            subcategory = %event.subcategory,
            "event received"
        );
        Ok(())
    })
    .await;

    let runner = {
        let bot = bot.clone();
        tokio::spawn(async move { bot.run().await })
    };

    tracing::info!("bizbot is running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    bot.stop();

    runner.await??;
    Ok(())
}
