//! Stats backend factory

use std::sync::Arc;

use crate::config::StatsConfig;
use crate::postgres::PostgresPool;

use super::backend::StatsBackend;
use super::memory_backend::MemoryStatsBackend;
use super::postgres_backend::PostgresStatsBackend;

/// Create a stats backend based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"postgres"`: Returns a `PostgresStatsBackend` if a PostgreSQL pool is provided
/// - `"memory"` (default): Returns a `MemoryStatsBackend`
///
/// # Example
///
/// ```rust,ignore
/// let backend = create_stats_backend(&settings.stats, Some(pg_pool.clone()));
/// backend.initialize().await?;
/// ```
pub fn create_stats_backend(
    settings: &StatsConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Arc<dyn StatsBackend> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    url = %pool.database_url_masked(),
                    "Creating PostgreSQL stats backend"
                );
                Arc::new(PostgresStatsBackend::new(pool.pool().clone()))
            } else {
                tracing::warn!(
                    "PostgreSQL stats backend requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryStatsBackend::new())
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory stats backend");
            Arc::new(MemoryStatsBackend::new())
        }
        other => {
            tracing::warn!(backend = %other, "Unknown stats backend, using memory");
            Arc::new(MemoryStatsBackend::new())
        }
    }
}
