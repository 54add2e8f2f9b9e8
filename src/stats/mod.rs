//! Usage statistics store
//!
//! Every remote open is appended as a `UsageEvent`; statistics are derived on
//! demand as a `DailyAggregate` grouped by calendar day in a configured zone.
//!
//! - `memory`: in-process log, lost on restart
//! - `postgres`: durable `usage_events` table

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;
mod store;
mod types;

pub use backend::{StatsBackend, StatsBackendError};
pub use factory::create_stats_backend;
pub use memory_backend::MemoryStatsBackend;
pub use postgres_backend::PostgresStatsBackend;
pub use store::StatsStore;
pub use types::{DailyAggregate, DayBreakdown, Requester, UsageEvent};
