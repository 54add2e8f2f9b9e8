use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::DeviceMetrics;

use super::stats::{ChannelInfo, RegistryStats};
use super::types::{is_valid_channel_name, DeviceFrame, DeviceHandle, RegistryError, RegistryLimits};

/// Tracks every connected device and the channel it serves
pub struct DeviceRegistry {
    /// device_id -> DeviceHandle
    devices: DashMap<Uuid, Arc<DeviceHandle>>,
    /// channel -> Set<device_id> (several devices may serve one channel)
    channel_index: DashMap<String, HashSet<Uuid>>,
    limits: RegistryLimits,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::with_limits(RegistryLimits::default())
    }

    pub fn with_limits(limits: RegistryLimits) -> Self {
        Self {
            devices: DashMap::new(),
            channel_index: DashMap::new(),
            limits,
        }
    }

    /// Register a newly connected device for `channel`.
    ///
    /// Existing devices on the same channel are kept; commands fan out to all of them.
    pub fn register(
        &self,
        channel: &str,
        sender: mpsc::Sender<DeviceFrame>,
    ) -> Result<Arc<DeviceHandle>, RegistryError> {
        if !is_valid_channel_name(channel) {
            return Err(RegistryError::InvalidChannel(channel.to_string()));
        }

        let current = self.devices.len();
        if current >= self.limits.max_devices {
            return Err(RegistryError::TotalLimitExceeded {
                current,
                max: self.limits.max_devices,
            });
        }

        let handle = Arc::new(DeviceHandle::new(channel.to_string(), sender));
        let device_id = handle.id;

        // The channel entry lock serializes concurrent registrations on one channel
        {
            let mut members = self.channel_index.entry(channel.to_string()).or_default();
            if members.len() >= self.limits.max_devices_per_channel {
                return Err(RegistryError::ChannelLimitExceeded {
                    channel: channel.to_string(),
                    current: members.len(),
                    max: self.limits.max_devices_per_channel,
                });
            }

            // Registrations on other channels race past the check above; recount after inserting
            self.devices.insert(device_id, handle.clone());
            let current = self.devices.len();
            if current > self.limits.max_devices {
                self.devices.remove(&device_id);
                let emptied = members.is_empty();
                drop(members);
                if emptied {
                    self.channel_index.remove_if(channel, |_, ids| ids.is_empty());
                }
                return Err(RegistryError::TotalLimitExceeded {
                    current: current - 1,
                    max: self.limits.max_devices,
                });
            }

            members.insert(device_id);
            DeviceMetrics::record_registered(channel, members.len());
        }

        tracing::info!(device_id = %device_id, channel = %channel, "Device registered");

        Ok(handle)
    }

    /// Remove a device, whatever channel it serves.
    ///
    /// Idempotent: unknown or already removed ids are ignored, so duplicate close
    /// events are harmless. Returns the removed handle.
    pub fn unregister(&self, device_id: Uuid) -> Option<Arc<DeviceHandle>> {
        let (_, handle) = self.devices.remove(&device_id)?;

        if let Entry::Occupied(mut members) = self.channel_index.entry(handle.channel.clone()) {
            members.get_mut().remove(&device_id);
            let remaining = members.get().len();
            DeviceMetrics::record_unregistered(&handle.channel, remaining);
            if remaining == 0 {
                members.remove();
            }
        }

        handle.mark_disconnected();

        tracing::info!(
            device_id = %device_id,
            channel = %handle.channel,
            connected_secs = Utc::now().signed_duration_since(handle.connected_at).num_seconds(),
            "Device unregistered"
        );

        Some(handle)
    }

    /// Whether at least one device currently serves `channel`.
    ///
    /// A snapshot: the device may disconnect right after this returns.
    pub fn is_available(&self, channel: &str) -> bool {
        self.channel_index
            .get(channel)
            .is_some_and(|members| !members.is_empty())
    }

    /// All devices currently serving `channel`; empty for unknown channels.
    pub fn handles_for(&self, channel: &str) -> Vec<Arc<DeviceHandle>> {
        self.channel_index
            .get(channel)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.devices.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all_devices(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.iter().map(|r| r.value().clone()).collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn channel_info(&self, channel: &str) -> ChannelInfo {
        ChannelInfo {
            name: channel.to_string(),
            device_count: self.channel_index.get(channel).map_or(0, |m| m.len()),
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let channels: HashMap<String, usize> = self
            .channel_index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();

        RegistryStats {
            total_devices: self.devices.len(),
            channels,
        }
    }

    /// Devices with no inbound activity for longer than `timeout`
    pub fn find_stale(&self, timeout: Duration) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);

        self.devices
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Unregister stale devices and return how many were removed
    pub fn cleanup_stale(&self, timeout: Duration) -> usize {
        let stale = self.find_stale(timeout);
        let mut removed = 0;

        for device_id in stale {
            tracing::warn!(
                device_id = %device_id,
                timeout_secs = timeout.as_secs(),
                "Removing device that missed its heartbeat window"
            );
            if self.unregister(device_id).is_some() {
                removed += 1;
            }
        }

        removed
    }

    /// Unregister every device, e.g. on shutdown
    pub fn close_all(&self) -> usize {
        let ids: Vec<Uuid> = self.devices.iter().map(|r| *r.key()).collect();
        ids.into_iter()
            .filter(|id| self.unregister(*id).is_some())
            .count()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
