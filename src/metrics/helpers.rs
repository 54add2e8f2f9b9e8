//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCASTS_TOTAL, CHANNEL_DEVICES, DEVICES_CONNECTED, DEVICE_CONNECTIONS_CLOSED,
    DEVICE_CONNECTIONS_OPENED, DEVICE_CONNECTION_DURATION, DEVICE_REJECTIONS_TOTAL,
    EMPTY_BROADCASTS_TOTAL, FRAMES_DROPPED_TOTAL, FRAMES_QUEUED_TOTAL, HEARTBEAT_PINGS_TOTAL,
    OPENS_RECORDED_TOTAL, OPENS_UNAVAILABLE_TOTAL, STALE_DEVICES_REMOVED_TOTAL,
    STATS_STORE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording device metrics
pub struct DeviceMetrics;

impl DeviceMetrics {
    /// Called under the channel's index lock with the channel's new device count
    pub fn record_registered(channel: &str, channel_devices: usize) {
        DEVICES_CONNECTED.inc();
        CHANNEL_DEVICES
            .with_label_values(&[channel])
            .set(channel_devices as i64);
    }

    /// Drops the channel series once its last device leaves
    pub fn record_unregistered(channel: &str, channel_devices: usize) {
        DEVICES_CONNECTED.dec();
        if channel_devices == 0 {
            let _ = CHANNEL_DEVICES.remove_label_values(&[channel]);
        } else {
            CHANNEL_DEVICES
                .with_label_values(&[channel])
                .set(channel_devices as i64);
        }
    }

    pub fn record_connection_opened() {
        DEVICE_CONNECTIONS_OPENED.inc();
    }

    pub fn record_connection_closed(duration_secs: f64) {
        DEVICE_CONNECTIONS_CLOSED.inc();
        DEVICE_CONNECTION_DURATION.observe(duration_secs);
    }

    /// Record a refused handshake ("channel", "token", "limit")
    pub fn record_rejected(reason: &str) {
        DEVICE_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for recording relay metrics
pub struct RelayMetrics;

impl RelayMetrics {
    pub fn record_broadcast(channel: &str) {
        BROADCASTS_TOTAL.with_label_values(&[channel]).inc();
    }

    pub fn record_empty_broadcast(channel: &str) {
        EMPTY_BROADCASTS_TOTAL.with_label_values(&[channel]).inc();
    }

    pub fn record_queued(count: u64) {
        FRAMES_QUEUED_TOTAL.inc_by(count);
    }

    pub fn record_dropped(count: u64) {
        FRAMES_DROPPED_TOTAL.inc_by(count);
    }

    pub fn record_unavailable(channel: &str) {
        OPENS_UNAVAILABLE_TOTAL.with_label_values(&[channel]).inc();
    }
}

/// Helper struct for recording heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_pings(count: u64) {
        HEARTBEAT_PINGS_TOTAL.inc_by(count);
    }

    pub fn record_stale_removed(count: u64) {
        STALE_DEVICES_REMOVED_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording stats store metrics
pub struct StatsMetrics;

impl StatsMetrics {
    pub fn record_open(channel: &str) {
        OPENS_RECORDED_TOTAL.with_label_values(&[channel]).inc();
    }

    pub fn record_store_error() {
        STATS_STORE_ERRORS_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_metrics() {
        RelayMetrics::record_broadcast("metrics-test");
        StatsMetrics::record_open("metrics-test");

        let output = encode_metrics().unwrap();
        assert!(output.contains("door_broadcasts_total"));
        assert!(output.contains("door_opens_recorded_total"));
        assert!(output.contains("metrics-test"));
    }

    #[test]
    fn test_channel_gauge_is_dropped_when_channel_empties() {
        DeviceMetrics::record_registered("gauge-test", 1);
        DeviceMetrics::record_registered("gauge-test", 2);
        assert_eq!(CHANNEL_DEVICES.with_label_values(&["gauge-test"]).get(), 2);

        DeviceMetrics::record_unregistered("gauge-test", 1);
        assert_eq!(CHANNEL_DEVICES.with_label_values(&["gauge-test"]).get(), 1);

        DeviceMetrics::record_unregistered("gauge-test", 0);
        assert!(!encode_metrics().unwrap().contains("gauge-test"));
    }
}
