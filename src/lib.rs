// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;

// Domain
pub mod device;
pub mod relay;
pub mod stats;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
pub mod websocket;

// Background tasks
pub mod tasks;
