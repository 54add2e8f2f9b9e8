//! Prometheus metrics endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::metrics;
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    update_metrics_from_state(&state);

    match metrics::encode_metrics() {
        Ok(output) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode Prometheus metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Resync gauges with the registry before a scrape
fn update_metrics_from_state(state: &AppState) {
    let registry_stats = state.registry.stats();
    metrics::DEVICES_CONNECTED.set(registry_stats.total_devices as i64);

    for (channel, count) in &registry_stats.channels {
        metrics::CHANNEL_DEVICES
            .with_label_values(&[channel])
            .set(*count as i64);
    }
}
