use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::core::config::AppConfig;
use review_runner::{AiProcessConfig, Worker, WorkerSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is a local-dev convenience; deployments pass real environment.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::from_env().context("configuration invalid; refusing to start")?;
    let state = api::build_state(config.clone())
        .await
        .context("failed to initialize backing services")?;

    // Best-effort credential check; a bad token should be visible at boot,
    // not on the first webhook.
    match state.host.get_user().await {
        Ok(user) => info!(username = %user.username, "host credentials verified"),
        Err(e) => error!(error = %e, "host credential check failed; continuing anyway"),
    }

    let ai = if config.ai_enabled {
        AiProcessConfig {
            enabled: true,
            api_key: config.ai_api_key.clone(),
            endpoint: std::env::var("AI_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        }
    } else {
        AiProcessConfig::disabled()
    };

    let worker = Worker::new(
        state.store.clone(),
        state.queue.clone(),
        state.host.clone(),
        ai,
        WorkerSettings {
            concurrency: config.worker_concurrency as usize,
            lock_duration: Duration::from_millis(config.worker_lock_duration_ms),
            stalled_interval: Duration::from_millis(config.worker_stalled_interval_ms),
            max_stalled_count: config.worker_max_stalled_count,
            ..Default::default()
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = review_runner::spawn_worker(worker, shutdown_rx.clone());

    let server_shutdown = {
        let mut rx = shutdown_rx.clone();
        async move {
            let _ = rx.wait_for(|stop| *stop).await;
        }
    };
    let server_handle = tokio::spawn(api::serve(state.clone(), server_shutdown));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    if let Err(e) = worker_handle.await {
        error!(error = %e, "worker task panicked");
    }
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "server exited with error"),
        Err(e) => error!(error = %e, "server task panicked"),
    }

    state.store.close().await;
    state.queue.close().await;
    info!("shutdown complete");
    Ok(())
}

/// LOG_LEVEL drives the filter; RUST_LOG wins when set explicitly.
fn init_tracing() {
    let default = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
