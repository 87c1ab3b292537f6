//! jsonkv - An In-Memory Sharded JSON Key-Value Store
//!
//! This is the main entry point for the jsonkv server.
//! It loads the configuration, builds the engine, optionally restores the
//! last dump and starts periodic dumps, then serves clients until Ctrl+C.

use anyhow::Context;
use jsonkv::config::Config;
use jsonkv::server::Server;
use jsonkv::storage::{Engine, SnapshotScheduler};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
     _                 _
    (_)___  ___  _ __ | | ____   __
    | / __|/ _ \| '_ \| |/ /\ \ / /
    | \__ \ (_) | | | |   <  \ V /
   _/ |___/\___/|_| |_|_|\_\  \_/
  |__/

jsonkv v{} - In-Memory Sharded JSON Key-Value Store
──────────────────────────────────────────────────────────────
Environment: {}
Listening on {}

Use Ctrl+C to shutdown.
"#,
        jsonkv::VERSION,
        config.environment,
        config.bind_address()
    );
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received, stopping server...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("invalid configuration")?;

    // RUST_LOG wins over the debug flag
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);
    info!(config = ?config, "Configuration loaded");

    // Create the engine (shared across all connections)
    let engine = Arc::new(
        Engine::with_options(config.engine_options()).context("failed to create engine")?,
    );
    info!(
        shards = engine.shard_count(),
        encrypted = engine.is_encrypted(),
        "Engine initialized"
    );

    if config.restore_at_start {
        match engine.restore_from_disk() {
            Ok(count) => info!(keys = count, "Restored memory dump"),
            Err(e) => warn!(
                error = %e,
                path = %engine.dump_file_path().display(),
                "Could not restore memory dump, starting empty"
            ),
        }
    }

    let scheduler = if config.dump_memory {
        let snapshot_config = config.snapshot_config();
        info!(
            interval_secs = snapshot_config.effective_interval().as_secs(),
            path = %engine.dump_file_path().display(),
            "Periodic memory dumps enabled"
        );
        Some(SnapshotScheduler::start(Arc::clone(&engine), snapshot_config))
    } else {
        None
    };

    let server = Server::bind(config.bind_address(), Arc::clone(&engine), config.password.as_str())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?
        .with_max_connections(config.max_connections);

    server.run(shutdown_signal()).await;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }

    info!("Server shutdown complete");
    Ok(())
}
