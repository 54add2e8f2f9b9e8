use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::server::{api_key_auth, AppState};
use crate::triggers::{get_channel, get_usage, list_channels, open_channel};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

/// Open requests carry a requester and an optional duration, nothing more
const MAX_BODY_BYTES: usize = 16 * 1024;

pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Trigger API
        .nest(
            "/api/v1",
            Router::new()
                .route("/channels", get(list_channels))
                .route("/channels/{channel}", get(get_channel))
                .route("/channels/{channel}/open", post(open_channel))
                .route("/usage", get(get_usage))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(middleware::from_fn_with_state(state, api_key_auth)),
        )
}
