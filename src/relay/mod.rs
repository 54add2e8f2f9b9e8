//! Command relay between trigger collaborators and connected devices

mod command_relay;

pub use command_relay::{CommandRelay, RelayStats, RelayStatsSnapshot};
