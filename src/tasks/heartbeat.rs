use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc::error::TrySendError};

use crate::config::DeviceConfig;
use crate::device::{DeviceFrame, DeviceRegistry};
use crate::metrics::HeartbeatMetrics;

/// Background task that pings devices and drops the ones that went quiet
pub struct HeartbeatTask {
    config: DeviceConfig,
    registry: Arc<DeviceRegistry>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: DeviceConfig,
        registry: Arc<DeviceRegistry>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            registry,
            shutdown,
        }
    }

    /// Run the heartbeat and cleanup loops until shutdown
    pub async fn run(mut self) {
        let heartbeat_interval = Duration::from_secs(self.config.heartbeat_interval);
        let cleanup_interval = Duration::from_secs(self.config.cleanup_interval);
        let connection_timeout = Duration::from_secs(self.config.connection_timeout);

        let mut heartbeat_timer = tokio::time::interval(heartbeat_interval);
        let mut cleanup_timer = tokio::time::interval(cleanup_interval);

        // Skip immediate first tick
        heartbeat_timer.tick().await;
        cleanup_timer.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            cleanup_interval_secs = self.config.cleanup_interval,
            connection_timeout_secs = self.config.connection_timeout,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = heartbeat_timer.tick() => {
                    self.send_heartbeats();
                }
                _ = cleanup_timer.tick() => {
                    self.cleanup_stale_devices(connection_timeout);
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    /// Queue a ping for every device. A full buffer just skips this round.
    fn send_heartbeats(&self) {
        let devices = self.registry.all_devices();
        if devices.is_empty() {
            return;
        }

        let start = Instant::now();
        let mut sent = 0u64;
        let mut skipped = 0u64;

        for handle in devices {
            match handle.try_send(DeviceFrame::Ping) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    skipped += 1;
                    tracing::debug!(device_id = %handle.id, "Send buffer full, skipping heartbeat");
                }
                Err(TrySendError::Closed(_)) => {
                    skipped += 1;
                    tracing::debug!(device_id = %handle.id, "Transport gone, unregistering device");
                    self.registry.unregister(handle.id);
                }
            }
        }

        HeartbeatMetrics::record_pings(sent);

        tracing::debug!(
            sent = sent,
            skipped = skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Heartbeat round completed"
        );
    }

    fn cleanup_stale_devices(&self, timeout: Duration) {
        let removed = self.registry.cleanup_stale(timeout);

        if removed > 0 {
            HeartbeatMetrics::record_stale_removed(removed as u64);
            tracing::info!(
                removed = removed,
                timeout_secs = timeout.as_secs(),
                "Cleaned up stale devices"
            );
        }
    }
}
