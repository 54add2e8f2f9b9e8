//! Health check and statistics endpoints.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::relay::RelayStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub devices: DeviceHealthResponse,
    pub stats_store: StatsStoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeviceHealthResponse {
    pub total: usize,
    pub channels_count: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsStoreHealthResponse {
    pub backend: String,
    pub time_zone: String,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub devices: DeviceStats,
    pub relay: RelayStatsSnapshot,
    /// Usage events in the store; absent when the store cannot be reached
    pub recorded_opens: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DeviceStats {
    pub total_devices: usize,
    pub channels: HashMap<String, usize>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry_stats = state.registry.stats();

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let inner = pool.pool();
        PostgresHealthResponse {
            connected: !inner.is_closed(),
            pool_size: inner.size(),
            idle_connections: inner.num_idle(),
        }
    });

    let status = match &postgres {
        Some(pg) if !pg.connected => "degraded",
        _ => "healthy",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        devices: DeviceHealthResponse {
            total: registry_stats.total_devices,
            channels_count: registry_stats.channels.len(),
        },
        stats_store: StatsStoreHealthResponse {
            backend: state.stats_store.backend_type().to_string(),
            time_zone: state.stats_store.time_zone().name().to_string(),
        },
        postgres,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let registry_stats = state.registry.stats();

    Json(StatsResponse {
        devices: DeviceStats {
            total_devices: registry_stats.total_devices,
            channels: registry_stats.channels,
        },
        relay: state.relay.stats(),
        recorded_opens: state.stats_store.event_count().await.ok(),
    })
}
