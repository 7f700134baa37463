mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use statusquo_core::config::{AppConfig, LoadOptions};
use statusquo_engine::StatusQuoService;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use statusquo_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = spawn_scheduler(&app, shutdown_rx);

    let state = routes::AppState::new(
        StatusQuoService::new(app.context.clone()),
        app.config.admin.token.clone(),
    );
    let router = health::router(app.db_pool.clone()).merge(routes::router(state));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "statusquo-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown(shutdown_tx)).await?;
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "server stopping");

    if let Some(task) = scheduler {
        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        match tokio::time::timeout(grace, task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_error)) => error!(
                event_name = "system.scheduler.panicked",
                error = %join_error,
                "scheduler task ended abnormally"
            ),
            Err(_) => warn!(
                event_name = "system.scheduler.abandoned",
                grace_secs = grace.as_secs(),
                "scheduler did not stop within the grace period"
            ),
        }
    }

    app.db_pool.close().await;
    Ok(())
}

fn spawn_scheduler(app: &Application, shutdown: watch::Receiver<bool>) -> Option<JoinHandle<()>> {
    if !app.config.broadcast.enabled {
        info!(event_name = "system.scheduler.disabled", "daily broadcast disabled by config");
        return None;
    }

    let broadcaster = app.context.broadcaster();
    let schedule = app.context.settings.schedule;
    let clock = app.context.clock.clone();
    Some(tokio::spawn(async move {
        broadcaster.run_forever(schedule, Local, clock, shutdown).await;
    }))
}

/// Resolves on the first shutdown signal and tells background tasks to stop.
async fn wait_for_shutdown(shutdown: watch::Sender<bool>) {
    shutdown_signal().await;
    info!(event_name = "system.server.shutdown_signal", "shutdown signal received");
    let _ = shutdown.send(true);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(signal_error) = tokio::signal::ctrl_c().await {
            error!(error = %signal_error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(signal_error) => {
                error!(error = %signal_error, "failed to install SIGTERM handler");
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
