use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use crate::device::{DeviceFrame, DeviceRegistry};
use crate::metrics::{RelayMetrics, OTHER_CHANNEL_LABEL};

/// Statistics for the command relay
#[derive(Debug, Default)]
pub struct RelayStats {
    /// Broadcasts issued
    pub total_broadcasts: AtomicU64,
    /// Broadcasts that found no device on the channel
    pub empty_broadcasts: AtomicU64,
    /// Frames queued to device transports
    pub frames_queued: AtomicU64,
    /// Frames dropped (device buffer full or transport gone)
    pub frames_dropped: AtomicU64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            empty_broadcasts: self.empty_broadcasts.load(Ordering::Relaxed),
            frames_queued: self.frames_queued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of relay statistics
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatsSnapshot {
    pub total_broadcasts: u64,
    pub empty_broadcasts: u64,
    pub frames_queued: u64,
    pub frames_dropped: u64,
}

/// Relays commands from trigger collaborators to connected devices.
///
/// `available` followed by `broadcast` is not atomic: a device can drop in between.
/// The broadcast then finds nobody and does nothing, so the worst case is a caller
/// that reported "opening" without any physical effect. This is accepted.
pub struct CommandRelay {
    registry: Arc<DeviceRegistry>,
    /// Configured channels, always reported under their own metric label
    known_channels: HashSet<String>,
    stats: RelayStats,
}

impl CommandRelay {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self::with_known_channels(registry, std::iter::empty::<String>())
    }

    pub fn with_known_channels<I, S>(registry: Arc<DeviceRegistry>, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry,
            known_channels: channels.into_iter().map(Into::into).collect(),
            stats: RelayStats::default(),
        }
    }

    /// Metric label for `channel`.
    ///
    /// Callers choose channel names freely, so only configured channels and
    /// channels with a connected device get their own series; the rest share
    /// `OTHER_CHANNEL_LABEL`.
    pub fn metric_label<'a>(&self, channel: &'a str) -> &'a str {
        if self.known_channels.contains(channel) || self.registry.is_available(channel) {
            channel
        } else {
            OTHER_CHANNEL_LABEL
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether `channel` has at least one connected device right now
    pub fn available(&self, channel: &str) -> bool {
        self.registry.is_available(channel)
    }

    /// Send `payload` to every device currently serving `channel`.
    ///
    /// Fire-and-forget: frames are queued without waiting and per-device outcomes
    /// are only logged. An empty channel is a no-op.
    #[tracing::instrument(name = "relay.broadcast", skip(self, payload))]
    pub fn broadcast(&self, channel: &str, payload: impl Into<String>) {
        let payload = payload.into();
        let devices = self.registry.handles_for(channel);

        let label = self.metric_label(channel);

        self.stats.total_broadcasts.fetch_add(1, Ordering::Relaxed);
        RelayMetrics::record_broadcast(label);

        if devices.is_empty() {
            self.stats.empty_broadcasts.fetch_add(1, Ordering::Relaxed);
            RelayMetrics::record_empty_broadcast(label);
            tracing::debug!(channel = %channel, "No device on channel, broadcast dropped");
            return;
        }

        let mut queued = 0u64;
        let mut dropped = 0u64;

        for device in &devices {
            match device.try_send(DeviceFrame::Command(payload.clone())) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    tracing::warn!(
                        device_id = %device.id,
                        channel = %channel,
                        "Device send buffer full, command dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    dropped += 1;
                    tracing::warn!(
                        device_id = %device.id,
                        channel = %channel,
                        "Device transport gone, unregistering"
                    );
                    self.registry.unregister(device.id);
                }
            }
        }

        self.stats.frames_queued.fetch_add(queued, Ordering::Relaxed);
        self.stats.frames_dropped.fetch_add(dropped, Ordering::Relaxed);
        RelayMetrics::record_queued(queued);
        RelayMetrics::record_dropped(dropped);

        tracing::info!(
            channel = %channel,
            payload = %payload,
            devices = devices.len(),
            queued = queued,
            dropped = dropped,
            "Command broadcast"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_broadcast_to_empty_channel_is_noop() {
        let relay = CommandRelay::new(Arc::new(DeviceRegistry::new()));

        assert!(!relay.available("garage"));
        relay.broadcast("garage", "2500");

        let stats = relay.stats();
        assert_eq!(stats.total_broadcasts, 1);
        assert_eq!(stats.empty_broadcasts, 1);
        assert_eq!(stats.frames_queued, 0);
        assert_eq!(stats.frames_dropped, 0);
    }

    #[test]
    fn test_broadcast_fans_out_to_every_device() {
        let registry = Arc::new(DeviceRegistry::new());
        let relay = CommandRelay::new(registry.clone());

        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let (tx_other, mut rx_other) = mpsc::channel(4);
        registry.register("door", tx_a).unwrap();
        registry.register("door", tx_b).unwrap();
        registry.register("garage", tx_other).unwrap();

        assert!(relay.available("door"));
        relay.broadcast("door", "2500");

        assert_eq!(rx_a.try_recv().unwrap(), DeviceFrame::Command("2500".to_string()));
        assert_eq!(rx_b.try_recv().unwrap(), DeviceFrame::Command("2500".to_string()));
        assert!(rx_other.try_recv().is_err());
        assert_eq!(relay.stats().frames_queued, 2);
    }

    #[test]
    fn test_closed_transport_is_unregistered() {
        let registry = Arc::new(DeviceRegistry::new());
        let relay = CommandRelay::new(registry.clone());

        let (tx, rx) = mpsc::channel(4);
        let handle = registry.register("door", tx).unwrap();
        drop(rx);

        relay.broadcast("door", "2500");

        assert!(!handle.is_connected());
        assert!(!relay.available("door"));
        assert_eq!(relay.stats().frames_dropped, 1);
    }

    #[test]
    fn test_full_buffer_drops_without_unregistering() {
        let registry = Arc::new(DeviceRegistry::new());
        let relay = CommandRelay::new(registry.clone());

        let (tx, mut rx) = mpsc::channel(1);
        registry.register("door", tx).unwrap();

        relay.broadcast("door", "1000");
        relay.broadcast("door", "2000");

        assert!(relay.available("door"));
        assert_eq!(rx.try_recv().unwrap(), DeviceFrame::Command("1000".to_string()));
        assert!(rx.try_recv().is_err());

        let stats = relay.stats();
        assert_eq!(stats.frames_queued, 1);
        assert_eq!(stats.frames_dropped, 1);
    }

    #[test]
    fn test_unknown_channels_share_metric_label() {
        let registry = Arc::new(DeviceRegistry::new());
        let relay = CommandRelay::with_known_channels(registry.clone(), ["door", "garage"]);

        let (tx, _rx) = mpsc::channel(4);
        registry.register("side-gate", tx).unwrap();

        assert_eq!(relay.metric_label("door"), "door");
        assert_eq!(relay.metric_label("side-gate"), "side-gate");
        assert_eq!(relay.metric_label("junk-label-1"), OTHER_CHANNEL_LABEL);

        for i in 0..20 {
            relay.broadcast(&format!("junk-label-{}", i), "2500");
        }

        let output = crate::metrics::encode_metrics().unwrap();
        assert!(!output.contains("junk-label-"));
        assert!(output.contains(&format!("channel=\"{}\"", OTHER_CHANNEL_LABEL)));
        assert_eq!(relay.stats().empty_broadcasts, 20);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = RelayStats::default();
        stats.total_broadcasts.fetch_add(3, Ordering::Relaxed);
        stats.frames_queued.fetch_add(5, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_broadcasts, 3);
        assert_eq!(snapshot.frames_queued, 5);
    }
}
