//! skc - SketchCheck command-line client
//!
//! Logs in through the backend-hosted Google OAuth flow, uploads sketches,
//! waits for their analysis and prints the score reports.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skc_common::config::{load_toml_config, ConfigResolver, LoggingConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skc_client::ClientContext;

mod commands;

/// Command-line arguments for skc
#[derive(Parser, Debug)]
#[command(name = "skc")]
#[command(about = "SketchCheck sketch-scoring client")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides SKETCHCHECK_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Config file path
    #[arg(long, global = true, env = "SKETCHCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the Google sign-in URL
    Login,
    /// Finish sign-in from the redirect URL (or its query string)
    Callback {
        /// Redirect URL carrying ?token=... or ?error=...
        url: String,
    },
    /// Show the logged-in user
    Whoami,
    /// Upload sketches and print their score reports
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Fetch the score of an earlier upload
    Score { task_id: String },
    /// Check that the backend is reachable
    Health,
    /// Forget the stored token and notify the backend
    Logout,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let resolver = ConfigResolver::new()
        .with_api_url(args.api_url.clone())
        .with_config_path(args.config.clone());

    // Logging settings come from the config file before the rest of it is resolved
    let logging = load_toml_config(&resolver.config_path())
        .ok()
        .flatten()
        .map(|config| config.logging)
        .unwrap_or_default();
    init_tracing(&logging)?;

    info!(
        "Starting skc v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Command::Config {
        action: ConfigAction::Init { force },
    } = args.command
    {
        return commands::config_init(&resolver.config_path(), force);
    }

    let config = resolver
        .resolve()
        .context("Failed to resolve configuration")?;
    let ctx = ClientContext::new(config).context("Failed to initialize client")?;

    match args.command {
        Command::Login => commands::login(&ctx).await,
        Command::Callback { url } => commands::callback(&ctx, &url).await,
        Command::Whoami => commands::whoami(&ctx).await,
        Command::Analyze { files } => commands::analyze(&ctx, &files).await,
        Command::Score { task_id } => commands::score(&ctx, &task_id).await,
        Command::Health => commands::health(&ctx).await,
        Command::Logout => commands::logout(&ctx).await,
        Command::Config { .. } => Ok(()),
    }
}

/// `RUST_LOG` wins over the configured level; logs go to stderr unless a file is set
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level {:?}", logging.level))?;

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .context("Failed to initialize logging")?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to initialize logging")?;
        }
    }
    Ok(())
}
