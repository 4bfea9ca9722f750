use anyhow::{Context, Result};
use calendar_oauth_connect as lib;
use clap::{Parser, Subcommand};
use lib::config::Config;
use lib::session::{SessionManager, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "calendar-oauth-connect", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the account to the scheduling provider (interactive)
    Connect,
    /// Show connection status and token validity
    Status,
    /// Force a token refresh now
    Refresh,
    /// Disconnect: tear down the stored session and any pending attempt
    Disconnect,
    /// Validate config file and exit
    ConfigValidate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // system-wide /etc/calendar-connect/config.toml and fall back to the
    // repository example config for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/calendar-connect/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "calendar-connect.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");

    match cli.command {
        Commands::Connect => {
            run_connect(&cfg).await.with_context(|| "connecting account".to_string())?;
        }
        Commands::Status => {
            let manager = open_manager(&cfg).await?;
            match manager.state().await {
                SessionState::NoSession => println!("Not connected."),
                SessionState::Valid => {
                    println!("Connected, token valid.");
                    if let Some(account) = manager.account().await {
                        println!("Account: {}", account);
                    }
                }
                SessionState::Expired => println!("Connected, token expired (will refresh on next use)."),
                SessionState::RefreshInFlight => println!("Refresh in progress."),
                SessionState::Invalid => println!("Stored token is malformed; reconnect required."),
            }
        }
        Commands::Refresh => {
            let manager = open_manager(&cfg).await?;
            match manager.ensure_bearer().await {
                Ok(_) => println!("Token valid (refreshed if it was expired)."),
                Err(e) => {
                    eprintln!("Refresh failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Disconnect => {
            let manager = open_manager(&cfg).await?;
            manager.teardown().await?;
            let db_path = cfg.db_path.clone();
            tokio::task::spawn_blocking(move || -> Result<()> {
                let conn = lib::db::open_or_create(&db_path)?;
                lib::db::clear_verifier(&conn)?;
                Ok(())
            })
            .await??;
            println!("Disconnected.");
        }
        Commands::ConfigValidate => {
            match Config::from_path(resolved_config_path.as_path()) {
                Ok(_) => println!("OK"),
                Err(e) => {
                    eprintln!("Config validation failed: {}", e);
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}

async fn open_manager(cfg: &Config) -> Result<SessionManager> {
    let manager = SessionManager::open(
        cfg.db_path.clone(),
        cfg.refresh_margin_sec,
        Arc::new(lib::api::backend::HttpBackend::new()),
    )
    .await?;
    Ok(manager)
}

/// Interactive connect flow:
/// 1. Build the provider authorization URL (PKCE S256) and print it.
/// 2. User opens it in a browser, approves and gets redirected back.
/// 3. User copies the full redirect URL and pastes it into this CLI.
/// 4. The CLI extracts the `code` param and exchanges it, with the stored
///    verifier, for an access/refresh token pair via the backend.
///
/// This avoids running an embedded HTTP server and works well for manual setup.
async fn run_connect(cfg: &Config) -> Result<()> {
    let url = lib::connect::begin_attempt(cfg).await?;

    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing, you'll be redirected to {}.", cfg.redirect_uri());
    println!("Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let code = lib::connect::extract_code_from_redirect(input.trim())?;

    let manager = open_manager(cfg).await?;
    let pair = lib::connect::complete_attempt(cfg, &manager, &code).await?;
    match pair.account {
        Some(account) => println!("Connected as {}.", account),
        None => println!("Connected."),
    }
    Ok(())
}
