//! Stash server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use stash_core::config::AppConfig;
use stash_metadata::MetadataStore;
use stash_metadata::accounts;
use stash_server::bootstrap::backfill_api_keys;
use stash_server::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stash - a per-user bookmark service
#[derive(Parser, Debug)]
#[command(name = "stashd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "STASH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Issue a new API key for an account and print it
    ///
    /// Keys assigned by the startup backfill are never shown, so this is how
    /// the owner of an older account gets a usable key.
    IssueKey {
        /// Email of the account
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `issue-key` output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Stash v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    let metadata = stash_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    backfill_api_keys(metadata.as_ref(), &config.backfill).await;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, metadata).await,
        Command::IssueKey { email } => {
            let account = accounts::lookup_by_email(metadata.as_ref(), email.trim())
                .await
                .with_context(|| format!("no account for {}", email.trim()))?;
            let api_key = accounts::rotate_api_key(metadata.as_ref(), account.id)
                .await
                .context("failed to issue API key")?;
            println!("{}", api_key.expose());
            Ok(())
        }
    }
}

/// Load configuration from the optional TOML file, then `STASH_*` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();

    if config_path.exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(config_path));
    } else {
        tracing::debug!("No config file found at {}, using defaults", path);
    }

    // STASH_SERVER and STASH_API_KEY belong to stashctl.
    figment
        .merge(
            Env::prefixed("STASH_")
                .ignore(&["config", "server", "api_key"])
                .split("__"),
        )
        .extract()
        .context("failed to load configuration")
}

async fn serve(config: AppConfig, metadata: Arc<dyn MetadataStore>) -> Result<()> {
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::new(config, metadata);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
