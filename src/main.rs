//! Main entry point for the doubles ladder service
//!
//! Loads configuration, initializes logging, and either validates the
//! configuration, prints the current leaderboard, or serves the HTTP API
//! until a shutdown signal arrives.

use anyhow::Result;
use clap::Parser;
use doubles_ladder::config::AppConfig;
use doubles_ladder::service::{ApiServer, AppState};
use doubles_ladder::types::PlayerStats;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Doubles Ladder - rating service with history replay and snapshot cache
#[derive(Parser)]
#[command(
    name = "doubles-ladder",
    version,
    about = "Doubles ladder ratings served from a coherent snapshot cache",
    long_about = "Doubles Ladder rebuilds every player's rating from the full match log, \
                 keeps the result in a time-boxed snapshot backed by a flat key-value store, \
                 and serves standings, match history and previews over HTTP."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Dataset override
    #[arg(long, value_name = "FILE", help = "JSON dataset used as the remote store")]
    dataset: Option<PathBuf>,

    /// Cache directory override
    #[arg(long, value_name = "DIR", help = "Directory for persisted snapshots")]
    cache_dir: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,

    /// Print standings and exit
    #[arg(long, help = "Warm the cache, print the leaderboard and exit")]
    leaderboard: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Doubles Ladder");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP: {}", config.http_addr());
    match &config.remote.dataset_path {
        Some(path) => info!("   Dataset: {}", path.display()),
        None => info!("   Dataset: none (empty ladder)"),
    }
    match &config.cache.store_dir {
        Some(dir) => info!("   Cache dir: {}", dir.display()),
        None => info!("   Cache dir: none (in memory)"),
    }
    info!("   Cache ttl: {}s", config.cache.ttl_seconds);
}

/// Load and merge configuration from environment, file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }
    if let Some(dataset) = &args.dataset {
        config.remote.dataset_path = Some(dataset.clone());
    }
    if let Some(cache_dir) = &args.cache_dir {
        config.cache.store_dir = Some(cache_dir.clone());
    }

    doubles_ladder::config::validate_config(&config)?;
    Ok(config)
}

fn print_leaderboard(players: &[PlayerStats]) {
    println!(
        "{:>4}  {:<24} {:>6} {:>6} {:>4} {:>4}",
        "#", "Player", "Rating", "+/-", "W", "L"
    );
    for (rank, player) in players.iter().enumerate() {
        println!(
            "{:>4}  {:<24} {:>6} {:>+6} {:>4} {:>4}",
            rank + 1,
            player.name,
            player.current_rating,
            player.progression,
            player.wins,
            player.losses
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    let app_state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if args.leaderboard {
        let coordinator = app_state.coordinator();
        let snapshot = coordinator.warm_up().await?;
        print_leaderboard(&snapshot.players);
        if !snapshot.skipped.is_empty() {
            warn!("{} matches were skipped during replay", snapshot.skipped.len());
        }
        return Ok(());
    }

    display_startup_banner(&config);

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let server = Arc::new(ApiServer::new(config.http_addr(), app_state.clone()));
    let server_task = {
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("HTTP API failed: {:#}", e);
            }
        })
    };

    info!("Doubles Ladder is running, press Ctrl+C to shut down");
    wait_for_shutdown_signal().await;
    info!("Shutdown signal received, beginning graceful shutdown...");

    server.stop();
    let shutdown = async {
        if let Err(e) = server_task.await {
            warn!("HTTP API task ended abnormally: {}", e);
        }
        app_state.shutdown().await
    };

    match tokio::time::timeout(config.shutdown_timeout(), shutdown).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Doubles Ladder stopped");
    Ok(())
}
