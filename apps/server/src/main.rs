//! Psychosonus Server - standalone headless music bot server.
//!
//! Runs the playback coordinator and serves the HTTP/WebSocket API. Audio
//! is played through an external player process; yt-dlp supplies search
//! and stream extraction.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use psychosonus_core::{bootstrap_services, start_server, AppState, TokioSpawner};
use tokio::signal;

use crate::config::ServerConfig;

/// Psychosonus Server - headless music queue and playback server.
#[derive(Parser, Debug)]
#[command(name = "psychosonus-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "PSYCHOSONUS_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Voice channel to join at startup (overrides config file).
    #[arg(long)]
    channel: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Psychosonus Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(channel) = args.channel {
        config.channel = Some(channel);
    }

    log::info!(
        "Configuration: bind_port={}, max_queue_size={}, ytdlp={}, player={}",
        config.bind_port,
        config.max_queue_size,
        config.ytdlp_path,
        config.player.program
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config, TokioSpawner::current())
        .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    if let Some(ref channel) = config.channel {
        match services.handle.connect(channel).await {
            Ok(outcome) => log::info!(
                "Joined '{}' (session {})",
                outcome.channel,
                outcome.session_id
            ),
            Err(e) => log::warn!("Could not join '{}' at startup: {}", channel, e),
        }
    }

    let app_state = AppState::new(&services);
    let server_cancel = services.cancel_token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, server_cancel).await {
            log::error!("Server error: {}", e);
        }
    });

    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;

    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
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
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
