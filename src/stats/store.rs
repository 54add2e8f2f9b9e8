use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::metrics::StatsMetrics;

use super::backend::{StatsBackend, StatsBackendError};
use super::types::{DailyAggregate, Requester, UsageEvent};

/// Records remote opens and answers usage queries.
///
/// Day buckets use the configured zone, never the host's local one.
pub struct StatsStore {
    backend: Arc<dyn StatsBackend>,
    time_zone: Tz,
}

impl StatsStore {
    pub fn new(backend: Arc<dyn StatsBackend>, time_zone: Tz) -> Self {
        Self { backend, time_zone }
    }

    pub fn backend_type(&self) -> &'static str {
        self.backend.backend_type()
    }

    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Record one open of `channel` by `requester`, timestamped now.
    pub async fn register_open(
        &self,
        channel: &str,
        requester: &Requester,
    ) -> Result<UsageEvent, StatsBackendError> {
        self.register_open_at(channel, requester, Utc::now()).await
    }

    /// Record one open with an explicit timestamp.
    #[tracing::instrument(name = "stats.register_open", skip(self, requester), fields(requester = %requester.name))]
    pub async fn register_open_at(
        &self,
        channel: &str,
        requester: &Requester,
        opened_at: DateTime<Utc>,
    ) -> Result<UsageEvent, StatsBackendError> {
        let event = UsageEvent {
            channel: channel.to_string(),
            requester: requester.clone(),
            opened_at,
        };

        match self.backend.append(&event).await {
            Ok(()) => {
                StatsMetrics::record_open(channel);
                tracing::debug!(channel = %channel, "Usage event recorded");
                Ok(event)
            }
            Err(e) => {
                StatsMetrics::record_store_error();
                tracing::error!(
                    error = %e,
                    channel = %channel,
                    backend = self.backend.backend_type(),
                    "Failed to record usage event"
                );
                Err(e)
            }
        }
    }

    /// Current daily breakdown, or `None` if nothing was ever recorded.
    pub async fn get_stats(&self) -> Result<Option<DailyAggregate>, StatsBackendError> {
        self.backend
            .daily_aggregate(self.time_zone)
            .await
            .inspect_err(|e| {
                StatsMetrics::record_store_error();
                tracing::error!(error = %e, "Failed to aggregate usage stats");
            })
    }

    pub async fn event_count(&self) -> Result<u64, StatsBackendError> {
        self.backend.event_count().await
    }
}
