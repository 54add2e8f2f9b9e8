//! Backend trait for usage statistics storage.
//!
//! This module defines the abstraction layer for stats backends, allowing
//! different storage implementations (memory, PostgreSQL) to be used
//! interchangeably.

use async_trait::async_trait;
use chrono_tz::Tz;
use thiserror::Error;

use super::types::{DailyAggregate, UsageEvent};

/// Errors that can occur during stats backend operations.
///
/// Any of these means the store could not honor the request; callers report a
/// service failure instead of silently losing the event.
#[derive(Debug, Error)]
pub enum StatsBackendError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Stored data could not be interpreted
    #[error("Corrupt stats data: {0}")]
    Corrupt(String),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Backend trait for usage statistics storage.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) and must never lose an
/// append when called concurrently.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;

    /// Prepare storage (schema, connections) before first use
    async fn initialize(&self) -> Result<(), StatsBackendError> {
        Ok(())
    }

    /// Append one usage event
    async fn append(&self, event: &UsageEvent) -> Result<(), StatsBackendError>;

    /// Aggregate everything recorded so far, bucketed by day in `time_zone`.
    /// `None` when nothing was ever recorded.
    async fn daily_aggregate(&self, time_zone: Tz) -> Result<Option<DailyAggregate>, StatsBackendError>;

    /// Number of events recorded so far
    async fn event_count(&self) -> Result<u64, StatsBackendError>;
}
