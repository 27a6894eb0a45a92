//! Exoplanet classifier inference server.
//!
//! Usage:
//!   exoclass [--pipeline-path PATH] [--bind ADDR] [--alignment positional|by-name] [--eager-load]
//!
//! Every flag falls back to an environment variable (`PIPELINE_PATH`,
//! `BIND_ADDR`, `FEATURE_ALIGNMENT`, `PIPELINE_EAGER_LOAD`). Log output is
//! filtered through `RUST_LOG` (default `info`).

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use exoclass::{BundleLoader, Config, PredictionService, api};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    info!(
        pipeline_path = %config.pipeline_path.display(),
        bind = %config.bind_addr,
        alignment = %config.alignment,
        "starting exoclass"
    );

    let service = PredictionService::new(
        BundleLoader::from_path(&config.pipeline_path),
        config.alignment,
    );

    if config.eager_load {
        let warmup = service.clone();
        let loaded = tokio::task::spawn_blocking(move || warmup.loader().get().is_ok())
            .await
            .context("bundle warm-up task failed")?;
        if !loaded {
            warn!("pipeline not loaded at startup; serving health and 503 on predict");
        }
    }

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, api::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
