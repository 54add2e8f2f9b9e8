use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use door_open_service::config::Settings;
use door_open_service::postgres::PostgresPool;
use door_open_service::server::{create_app, AppState};
use door_open_service::stats::create_stats_backend;
use door_open_service::tasks::HeartbeatTask;
use door_open_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new().context("failed to load configuration")?;

    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        stats_backend = %settings.stats.backend,
        time_zone = %settings.stats.time_zone,
        "Configuration loaded"
    );

    // PostgreSQL is only needed for the durable stats backend
    let postgres_pool = if settings.stats.backend == "postgres" {
        let pool = PostgresPool::new(&settings.database)
            .await
            .context("failed to connect to PostgreSQL")?;
        Some(Arc::new(pool))
    } else {
        None
    };

    let stats_backend = create_stats_backend(&settings.stats, postgres_pool.clone());
    stats_backend
        .initialize()
        .await
        .context("failed to initialize stats backend")?;

    let state = AppState::new(settings.clone(), stats_backend, postgres_pool.clone())?;
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let heartbeat_task = HeartbeatTask::new(
        settings.devices.clone(),
        state.registry.clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(heartbeat_task.run());

    let registry = state.registry.clone();
    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = heartbeat_handle.await;

    let closed = registry.close_all();
    tracing::info!(devices = closed, "Closed device connections");

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
