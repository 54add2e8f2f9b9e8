//! In-memory stats backend.
//!
//! Keeps the event log in process memory; everything is lost on restart.

use async_trait::async_trait;
use chrono_tz::Tz;
use tokio::sync::RwLock;

use super::backend::{StatsBackend, StatsBackendError};
use super::types::{DailyAggregate, UsageEvent};

/// Append-only event log guarded by a single lock.
#[derive(Default)]
pub struct MemoryStatsBackend {
    events: RwLock<Vec<UsageEvent>>,
}

impl MemoryStatsBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsBackend for MemoryStatsBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, event: &UsageEvent) -> Result<(), StatsBackendError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn daily_aggregate(&self, time_zone: Tz) -> Result<Option<DailyAggregate>, StatsBackendError> {
        let events = self.events.read().await;
        Ok(DailyAggregate::from_events(events.iter(), time_zone))
    }

    async fn event_count(&self) -> Result<u64, StatsBackendError> {
        Ok(self.events.read().await.len() as u64)
    }
}
