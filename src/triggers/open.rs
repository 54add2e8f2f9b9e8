//! Remote open flow shared by every trigger front-end

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::metrics::RelayMetrics;
use crate::relay::CommandRelay;
use crate::stats::{Requester, StatsBackendError, StatsStore, UsageEvent};

/// Result of an open request
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    /// The command went out and the open was recorded
    Opened {
        channel: String,
        hold_open_ms: u64,
        event: UsageEvent,
    },
    /// No device serves the channel; nothing was sent or recorded
    Unavailable { channel: String },
}

/// Checks availability, relays the hold-open command, then records usage.
pub struct OpenService {
    relay: Arc<CommandRelay>,
    stats: Arc<StatsStore>,
    relay_config: RelayConfig,
}

impl OpenService {
    pub fn new(relay: Arc<CommandRelay>, stats: Arc<StatsStore>, relay_config: RelayConfig) -> Self {
        Self {
            relay,
            stats,
            relay_config,
        }
    }

    /// Open `channel` on behalf of `requester`.
    ///
    /// A store failure is returned after the command has already gone out;
    /// the open itself is never rolled back.
    #[tracing::instrument(
        name = "open.request",
        skip(self, requester),
        fields(requester = %requester.name)
    )]
    pub async fn open(
        &self,
        channel: &str,
        requester: &Requester,
        hold_open_ms: Option<u64>,
    ) -> Result<OpenOutcome, StatsBackendError> {
        if !self.relay.available(channel) {
            RelayMetrics::record_unavailable(self.relay.metric_label(channel));
            tracing::info!(channel = %channel, "Open requested but no device is connected");
            return Ok(OpenOutcome::Unavailable {
                channel: channel.to_string(),
            });
        }

        let hold_open_ms = self.relay_config.hold_open_ms(channel, hold_open_ms);
        self.relay.broadcast(channel, hold_open_ms.to_string());

        let event = self.stats.register_open(channel, requester).await?;

        tracing::info!(
            channel = %channel,
            hold_open_ms = hold_open_ms,
            requester = %requester.name,
            contact = %requester.contact,
            "Opening as requested"
        );

        Ok(OpenOutcome::Opened {
            channel: channel.to_string(),
            hold_open_ms,
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceFrame, DeviceRegistry};
    use crate::stats::{DailyAggregate, MemoryStatsBackend, StatsBackend};
    use async_trait::async_trait;
    use chrono_tz::Tz;
    use tokio::sync::mpsc;

    struct FailingBackend;

    #[async_trait]
    impl StatsBackend for FailingBackend {
        fn backend_type(&self) -> &'static str {
            "failing"
        }

        async fn append(&self, _event: &UsageEvent) -> Result<(), StatsBackendError> {
            Err(StatsBackendError::Unavailable("disk on fire".into()))
        }

        async fn daily_aggregate(&self, _tz: Tz) -> Result<Option<DailyAggregate>, StatsBackendError> {
            Err(StatsBackendError::Unavailable("disk on fire".into()))
        }

        async fn event_count(&self) -> Result<u64, StatsBackendError> {
            Ok(0)
        }
    }

    struct Fixture {
        service: OpenService,
        registry: Arc<DeviceRegistry>,
        relay: Arc<CommandRelay>,
        stats: Arc<StatsStore>,
    }

    fn service_with(backend: Arc<dyn StatsBackend>) -> Fixture {
        let registry = Arc::new(DeviceRegistry::new());
        let relay = Arc::new(CommandRelay::new(registry.clone()));
        let stats = Arc::new(StatsStore::new(backend, Tz::UTC));
        Fixture {
            service: OpenService::new(relay.clone(), stats.clone(), RelayConfig::default()),
            registry,
            relay,
            stats,
        }
    }

    #[tokio::test]
    async fn test_open_relays_and_records() {
        let fx = service_with(Arc::new(MemoryStatsBackend::new()));
        let (tx, mut rx) = mpsc::channel(4);
        fx.registry.register("door", tx).unwrap();

        let alice = Requester::new("alice", "alice@example.com");
        let outcome = fx.service.open("door", &alice, None).await.unwrap();

        match outcome {
            OpenOutcome::Opened { channel, hold_open_ms, event } => {
                assert_eq!(channel, "door");
                assert_eq!(hold_open_ms, 2500);
                assert_eq!(event.requester, alice);
            }
            other => panic!("expected Opened, got {:?}", other),
        }
        assert_eq!(rx.recv().await, Some(DeviceFrame::Command("2500".into())));

        let stats = fx.stats.get_stats().await.unwrap().unwrap();
        assert_eq!(stats.total(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_has_no_side_effects() {
        let fx = service_with(Arc::new(MemoryStatsBackend::new()));
        let bob = Requester::new("bob", "bob@example.com");

        let outcome = fx.service.open("garage", &bob, None).await.unwrap();
        assert!(matches!(outcome, OpenOutcome::Unavailable { ref channel } if channel == "garage"));
        assert!(fx.stats.get_stats().await.unwrap().is_none());
        assert_eq!(fx.relay.stats().total_broadcasts, 0);
    }

    #[tokio::test]
    async fn test_hold_open_override_is_capped() {
        let fx = service_with(Arc::new(MemoryStatsBackend::new()));
        let (tx, mut rx) = mpsc::channel(4);
        fx.registry.register("garage", tx).unwrap();

        let carol = Requester::new("carol", "");
        fx.service.open("garage", &carol, Some(1_000_000)).await.unwrap();
        assert_eq!(rx.recv().await, Some(DeviceFrame::Command("30000".into())));
    }

    #[tokio::test]
    async fn test_store_failure_keeps_broadcast() {
        let fx = service_with(Arc::new(FailingBackend));
        let (tx, mut rx) = mpsc::channel(4);
        fx.registry.register("door", tx).unwrap();

        let erin = Requester::new("erin", "erin@example.com");
        let result = fx.service.open("door", &erin, None).await;

        assert!(matches!(result, Err(StatsBackendError::Unavailable(_))));
        assert_eq!(rx.recv().await, Some(DeviceFrame::Command("2500".into())));
    }
}
