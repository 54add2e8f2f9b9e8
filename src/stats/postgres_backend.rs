//! PostgreSQL-based stats backend.
//!
//! Usage events are rows in an append-only `usage_events` table. Aggregation
//! runs as one statement so the per-day counts and `since` come from the same
//! snapshot.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;

use super::backend::{StatsBackend, StatsBackendError};
use super::types::{DailyAggregate, UsageEvent};

const SCHEMA: &str = include_str!("../../migrations/001_usage_events.sql");

/// PostgreSQL-based stats backend.
///
/// Table structure:
/// - `usage_events` - one row per open, never updated or deleted
pub struct PostgresStatsBackend {
    /// PostgreSQL connection pool
    pool: PgPool,
}

type AggregateRow = (NaiveDate, String, i64, Option<DateTime<Utc>>);

impl PostgresStatsBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and index when missing.
    pub async fn ensure_schema(&self) -> Result<(), StatsBackendError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("usage_events schema ready");
        Ok(())
    }
}

#[async_trait]
impl StatsBackend for PostgresStatsBackend {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn initialize(&self) -> Result<(), StatsBackendError> {
        self.ensure_schema().await
    }

    async fn append(&self, event: &UsageEvent) -> Result<(), StatsBackendError> {
        sqlx::query(
            r#"
            INSERT INTO usage_events (channel, requester_name, requester_contact, opened_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&event.channel)
        .bind(&event.requester.name)
        .bind(&event.requester.contact)
        .bind(event.opened_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, channel = %event.channel, "Failed to append usage event");
            StatsBackendError::Postgres(e)
        })?;

        tracing::trace!(channel = %event.channel, "Usage event stored in PostgreSQL");
        Ok(())
    }

    async fn daily_aggregate(&self, time_zone: Tz) -> Result<Option<DailyAggregate>, StatsBackendError> {
        let rows: Vec<AggregateRow> = sqlx::query_as(
            r#"
            SELECT (opened_at AT TIME ZONE $1)::date AS day,
                   channel,
                   COUNT(*) AS opens,
                   (SELECT MIN(opened_at) FROM usage_events) AS since
            FROM usage_events
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .bind(time_zone.name())
        .fetch_all(&self.pool)
        .await?;

        let since = rows.first().and_then(|row| row.3);
        let mut counts = Vec::with_capacity(rows.len());
        for (day, channel, opens, _) in rows {
            let opens = u64::try_from(opens)
                .map_err(|_| StatsBackendError::Corrupt(format!("negative count {} for {}", opens, day)))?;
            counts.push((day, channel, opens));
        }

        Ok(DailyAggregate::from_counts(since, counts))
    }

    async fn event_count(&self) -> Result<u64, StatsBackendError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM usage_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
