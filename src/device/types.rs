//! Device handle and related types

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::config::DeviceConfig;

/// Maximum length of a channel label
pub const MAX_CHANNEL_LEN: usize = 64;

/// Frames queued for delivery to a device transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFrame {
    /// Opaque command payload, written to the device verbatim
    Command(String),
    /// Liveness probe; the device is expected to answer with a pong
    Ping,
}

/// Lifecycle state of a device connection. `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Connected,
    Disconnected,
}

/// Handle for a single connected device
pub struct DeviceHandle {
    pub id: Uuid,
    pub channel: String,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<DeviceFrame>,
    /// Last activity timestamp (Unix millis), lock-free
    last_activity: AtomicI64,
    disconnected: AtomicBool,
    closed: Notify,
}

impl DeviceHandle {
    pub fn new(channel: String, sender: mpsc::Sender<DeviceFrame>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel,
            connected_at: now,
            sender,
            last_activity: AtomicI64::new(now.timestamp_millis()),
            disconnected: AtomicBool::new(false),
            closed: Notify::new(),
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Relaxed))
            .unwrap_or_else(Utc::now)
    }

    pub fn status(&self) -> DeviceStatus {
        if self.disconnected.load(Ordering::Acquire) {
            DeviceStatus::Disconnected
        } else {
            DeviceStatus::Connected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == DeviceStatus::Connected
    }

    /// Queue a frame without waiting for buffer space.
    pub fn try_send(&self, frame: DeviceFrame) -> Result<(), mpsc::error::TrySendError<DeviceFrame>> {
        self.sender.try_send(frame)
    }

    /// Mark the device disconnected and wake its transport task.
    /// Returns false if it was already disconnected.
    pub(crate) fn mark_disconnected(&self) -> bool {
        let first = !self.disconnected.swap(true, Ordering::AcqRel);
        if first {
            // notify_one stores a permit, so a transport that starts waiting later still wakes
            self.closed.notify_one();
        }
        first
    }

    /// Resolves once the device has been unregistered.
    pub async fn closed(&self) {
        if self.disconnected.load(Ordering::Acquire) {
            return;
        }
        self.closed.notified().await;
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("status", &self.status())
            .finish()
    }
}

/// Errors returned when a device cannot be registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid channel label: {0:?}")]
    InvalidChannel(String),

    #[error("Device limit exceeded ({current}/{max})")]
    TotalLimitExceeded { current: usize, max: usize },

    #[error("Channel {channel} device limit exceeded ({current}/{max})")]
    ChannelLimitExceeded {
        channel: String,
        current: usize,
        max: usize,
    },
}

/// Limits for device registration
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub max_devices: usize,
    pub max_devices_per_channel: usize,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_devices: 1000,
            max_devices_per_channel: 16,
        }
    }
}

impl From<&DeviceConfig> for RegistryLimits {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            max_devices: config.max_devices,
            max_devices_per_channel: config.max_devices_per_channel,
        }
    }
}

/// Validate a channel label
pub fn is_valid_channel_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_CHANNEL_LEN {
        return false;
    }

    // ASCII only, so the byte length is also the character count
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
