//! Registry of connected devices
//!
//! This module provides:
//! - Device handles with liveness tracking
//! - Channel indexing with fan-out to every device on a channel
//! - Stale device detection for the heartbeat task

mod registry;
mod stats;
mod types;

pub use registry::DeviceRegistry;
pub use stats::{ChannelInfo, RegistryStats};
pub use types::{
    is_valid_channel_name, DeviceFrame, DeviceHandle, DeviceStatus, RegistryError,
    RegistryLimits, MAX_CHANNEL_LEN,
};
