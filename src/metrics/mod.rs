//! Prometheus metrics for the door open service.
//!
//! - Device metrics (connected devices per channel, connection lifetimes)
//! - Relay metrics (broadcasts, queued and dropped command frames)
//! - Heartbeat metrics (pings, stale device removals)
//! - Stats store metrics (recorded opens, store failures)

mod helpers;

pub use helpers::{encode_metrics, DeviceMetrics, HeartbeatMetrics, RelayMetrics, StatsMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, Histogram, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "door";

/// Label for channels that are neither configured nor served by a device
pub const OTHER_CHANNEL_LABEL: &str = "other";

lazy_static! {
    // ============================================================================
    // Device Metrics
    // ============================================================================

    /// Total number of connected devices
    pub static ref DEVICES_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_devices_connected", METRIC_PREFIX),
        "Total number of connected devices"
    ).unwrap();

    /// Connected devices per channel
    pub static ref CHANNEL_DEVICES: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_channel_devices", METRIC_PREFIX),
        "Number of connected devices per channel",
        &["channel"]
    ).unwrap();

    /// Total device connections opened
    pub static ref DEVICE_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_device_connections_opened_total", METRIC_PREFIX),
        "Total device connections opened"
    ).unwrap();

    /// Total device connections closed
    pub static ref DEVICE_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_device_connections_closed_total", METRIC_PREFIX),
        "Total device connections closed"
    ).unwrap();

    /// Device connection duration
    pub static ref DEVICE_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_device_connection_duration_seconds", METRIC_PREFIX),
        "Device connection duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 1800.0, 3600.0, 21600.0, 86400.0]
    ).unwrap();

    /// Device handshakes rejected (bad channel, bad token, limits)
    pub static ref DEVICE_REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_device_rejections_total", METRIC_PREFIX),
        "Device handshakes rejected",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Relay Metrics
    // ============================================================================

    /// Broadcasts issued per channel
    pub static ref BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_broadcasts_total", METRIC_PREFIX),
        "Command broadcasts issued",
        &["channel"]
    ).unwrap();

    /// Broadcasts that found no device
    pub static ref EMPTY_BROADCASTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_empty_broadcasts_total", METRIC_PREFIX),
        "Command broadcasts on a channel without devices",
        &["channel"]
    ).unwrap();

    /// Command frames queued to device transports
    pub static ref FRAMES_QUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_command_frames_queued_total", METRIC_PREFIX),
        "Command frames queued to devices"
    ).unwrap();

    /// Command frames dropped
    pub static ref FRAMES_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_command_frames_dropped_total", METRIC_PREFIX),
        "Command frames dropped (buffer full or transport closed)"
    ).unwrap();

    /// Open requests refused because no device served the channel
    pub static ref OPENS_UNAVAILABLE_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_opens_unavailable_total", METRIC_PREFIX),
        "Open requests for channels without a connected device",
        &["channel"]
    ).unwrap();

    // ============================================================================
    // Heartbeat Metrics
    // ============================================================================

    /// Heartbeat pings queued
    pub static ref HEARTBEAT_PINGS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeat_pings_total", METRIC_PREFIX),
        "Heartbeat pings queued to devices"
    ).unwrap();

    /// Devices removed for missing the heartbeat window
    pub static ref STALE_DEVICES_REMOVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stale_devices_removed_total", METRIC_PREFIX),
        "Devices unregistered after the connection timeout"
    ).unwrap();

    // ============================================================================
    // Stats Store Metrics
    // ============================================================================

    /// Usage events recorded per channel
    pub static ref OPENS_RECORDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_opens_recorded_total", METRIC_PREFIX),
        "Usage events recorded",
        &["channel"]
    ).unwrap();

    /// Stats store failures
    pub static ref STATS_STORE_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_stats_store_errors_total", METRIC_PREFIX),
        "Stats store operations that failed"
    ).unwrap();
}
