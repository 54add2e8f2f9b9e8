//! PostgreSQL connection management for the durable stats backend.

mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
