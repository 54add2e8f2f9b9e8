use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{close_code, rejection::WebSocketUpgradeRejection, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::device::{is_valid_channel_name, DeviceFrame, DeviceHandle, RegistryError};
use crate::metrics::DeviceMetrics;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub channel: Option<String>,
    pub token: Option<String>,
}

/// Device transport upgrade handler.
///
/// Channel and token are checked before the upgrade itself, so a bad handshake
/// gets 400/401 even when the request is not a valid WebSocket upgrade.
#[tracing::instrument(
    name = "device.upgrade",
    skip(ws, state, query, headers),
    fields(channel = query.channel.as_deref().unwrap_or(""))
)]
pub async fn device_ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
    headers: HeaderMap,
) -> Response {
    let channel = match query.channel.as_deref() {
        Some(c) if is_valid_channel_name(c) => c.to_string(),
        other => {
            DeviceMetrics::record_rejected("channel");
            tracing::warn!(channel = ?other, "Device handshake with invalid channel");
            return (StatusCode::BAD_REQUEST, "Missing or invalid channel").into_response();
        }
    };

    if let Some(expected) = state.settings.devices.token.as_deref() {
        let presented = extract_token(&query, &headers);
        if presented.as_deref() != Some(expected) {
            DeviceMetrics::record_rejected("token");
            tracing::warn!(channel = %channel, "Device handshake with bad token");
            return (StatusCode::UNAUTHORIZED, "Invalid device token").into_response();
        }
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(channel = %channel, error = %rejection, "Device handshake is not a WebSocket upgrade");
            return rejection.into_response();
        }
    };

    tracing::info!(channel = %channel, "Device upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, channel))
}

/// Extract token from query parameter or Authorization header
fn extract_token(query: &DeviceQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(ref token) = query.token {
        return Some(token.clone());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn to_message(frame: DeviceFrame) -> Message {
    match frame {
        DeviceFrame::Command(payload) => Message::Text(payload.into()),
        DeviceFrame::Ping => Message::Ping(Default::default()),
    }
}

/// Reject a device the registry refused, then close
async fn reject(socket: WebSocket, channel: &str, error: RegistryError) {
    DeviceMetrics::record_rejected("limit");
    tracing::warn!(channel = %channel, error = %error, "Device registration rejected");

    let (mut ws_sender, _) = socket.split();
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: error.to_string().into(),
    };
    let _ = ws_sender.send(Message::Close(Some(frame))).await;
    let _ = ws_sender.close().await;
}

/// Drive an established device connection until it ends
#[tracing::instrument(
    name = "device.connection",
    skip(socket, state),
    fields(otel.kind = "server")
)]
async fn handle_socket(socket: WebSocket, state: AppState, channel: String) {
    let connection_start = Instant::now();
    let (tx, mut rx) = mpsc::channel::<DeviceFrame>(state.settings.devices.send_buffer.max(1));

    let handle = match state.registry.register(&channel, tx) {
        Ok(h) => h,
        Err(e) => {
            reject(socket, &channel, e).await;
            return;
        }
    };
    let device_id = handle.id;

    DeviceMetrics::record_connection_opened();
    tracing::info!(device_id = %device_id, channel = %channel, "Device connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(to_message(frame)).await.is_err() {
                break;
            }
        }
    });

    let handle_clone = handle.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !process_message(msg, &handle_clone) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(device_id = %handle_clone.id, error = %e, "Device receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(device_id = %device_id, "Send task completed");
        }
        _ = &mut recv_task => {
            tracing::debug!(device_id = %device_id, "Receive task completed");
        }
        _ = handle.closed() => {
            tracing::debug!(device_id = %device_id, "Device unregistered by server");
        }
    }

    send_task.abort();
    recv_task.abort();

    state.registry.unregister(device_id);

    let duration = connection_start.elapsed().as_secs_f64();
    DeviceMetrics::record_connection_closed(duration);

    tracing::info!(
        device_id = %device_id,
        channel = %channel,
        duration_secs = duration,
        "Device disconnected"
    );
}

/// Process one inbound frame. Returns false if the connection should end.
fn process_message(msg: Message, handle: &Arc<DeviceHandle>) -> bool {
    handle.update_activity();

    match msg {
        Message::Text(text) => {
            tracing::debug!(device_id = %handle.id, message = %text.as_str(), "Device message");
            true
        }
        Message::Binary(data) => {
            tracing::debug!(device_id = %handle.id, bytes = data.len(), "Ignoring binary device frame");
            true
        }
        // Pongs are answered automatically; activity is all that matters here
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(device_id = %handle.id, "Received close frame");
            false
        }
    }
}
