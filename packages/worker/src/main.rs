use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mq::{Mq, MqConfig, init_mq};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worker::config::WorkerAppConfig;
use worker::database::init_db;
use worker::models::sandbox::SandboxRunner;
use worker::models::sandbox::docker::DockerSandboxManager;
use worker::models::workspace::sweep_stale;
use worker::monitor::run_monitor;
use worker::{DbSubmissionStore, ExecutionWorker, SubmissionStore, UniversalExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WorkerAppConfig::load().context("Failed to load config")?;
    info!(worker_id = %config.worker.id, "Worker starting");

    let db = init_db(
        &config.database.url,
        config.worker.max_concurrent_executions as u32 + 2,
    )
    .await
    .context("Failed to connect to database")?;
    let store: Arc<dyn SubmissionStore> = Arc::new(DbSubmissionStore::new(db));

    let redis = init_mq(MqConfig::from(&config.mq))
        .await
        .context("Failed to initialize MQ")?;
    info!(queue_name = %redis.queue_name(), "MQ connected");
    let queue: Arc<Mq> = Arc::new(redis);

    let manager = DockerSandboxManager::connect(config.sandbox.pull_images)
        .context("Failed to initialize sandbox")?;

    let base = &config.sandbox.workspace_base_path;
    tokio::fs::create_dir_all(base)
        .await
        .with_context(|| format!("Failed to create workspace base {}", base.display()))?;
    match sweep_stale(base, Duration::from_secs(config.sandbox.stale_workspace_secs)).await {
        Ok(removed) => info!(removed, "Workspace sweep finished"),
        Err(e) => warn!(error = %e, "Workspace sweep failed"),
    }

    let runner = SandboxRunner::new(Arc::new(manager), config.sandbox.clone());
    let executor = Arc::new(UniversalExecutor::new(runner));

    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone(), abort.clone()));

    let monitor = tokio::spawn(run_monitor(
        Arc::clone(&store),
        Arc::clone(&queue),
        config.worker.clone(),
        shutdown.clone(),
    ));

    let worker = ExecutionWorker::new(queue, store, executor, config.worker.clone());
    worker.run(shutdown, abort).await;

    if let Err(e) = monitor.await {
        warn!(error = %e, "Monitor task failed");
    }
    info!("Worker exited");
    Ok(())
}

/// First signal: stop taking work and drain. Second signal: kill running sandboxes.
async fn watch_signals(shutdown: CancellationToken, abort: CancellationToken) {
    wait_for_signal().await;
    info!("Shutdown requested, finishing in-flight submissions (signal again to abort)");
    shutdown.cancel();

    wait_for_signal().await;
    warn!("Second signal received, aborting running executions");
    abort.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
