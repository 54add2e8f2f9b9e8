use std::collections::HashMap;
use std::env;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub devices: DeviceConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// Shared key for the trigger API. Unset means open access.
    pub key: Option<String>,
}

/// Device transport and liveness settings
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Heartbeat interval in seconds (server sends ping)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Connection timeout in seconds (unregister if no activity)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Cleanup task interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Shared token devices must present at handshake
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
    #[serde(default = "default_max_devices_per_channel")]
    pub max_devices_per_channel: usize,
    /// Outbound frame buffer per device
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Hold-open duration sent to devices when neither request nor channel overrides it
    #[serde(default = "default_hold_open_ms")]
    pub default_hold_open_ms: u64,
    #[serde(default = "default_max_hold_open_ms")]
    pub max_hold_open_ms: u64,
    /// Known channels. Devices may still declare channels not listed here.
    #[serde(default = "default_channels")]
    pub channels: HashMap<String, ChannelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfig {
    pub hold_open_ms: Option<u64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_stats_backend")]
    pub backend: String,
    /// IANA zone used to bucket usage events by calendar day
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// Presentation only: estimated seconds saved by each remote open
    #[serde(default = "default_seconds_saved_per_open")]
    pub seconds_saved_per_open: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_heartbeat_interval() -> u64 {
    15
}

fn default_connection_timeout() -> u64 {
    45
}

fn default_cleanup_interval() -> u64 {
    10
}

fn default_max_devices() -> usize {
    1000
}

fn default_max_devices_per_channel() -> usize {
    16
}

fn default_send_buffer() -> usize {
    16
}

fn default_hold_open_ms() -> u64 {
    2500
}

fn default_max_hold_open_ms() -> u64 {
    30_000
}

fn default_channels() -> HashMap<String, ChannelConfig> {
    ["door", "garage"]
        .into_iter()
        .map(|name| (name.to_string(), ChannelConfig::default()))
        .collect()
}

fn default_stats_backend() -> String {
    "memory".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_seconds_saved_per_open() -> u64 {
    40
}

fn default_database_url() -> String {
    "postgres://localhost:5432/door_open".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout_seconds() -> u32 {
    5
}

fn default_idle_timeout_seconds() -> u32 {
    300
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "door-open-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("devices.heartbeat_interval", 15)?
            .set_default("devices.connection_timeout", 45)?
            .set_default("devices.cleanup_interval", 10)?
            .set_default("stats.backend", "memory")?
            .set_default("stats.time_zone", "UTC")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, DEVICES__TOKEN, STATS__TIME_ZONE, DATABASE__URL, etc.
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Reject values that would make the relay or the stats store misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stats.time_zone()?;

        let devices = &self.devices;
        if devices.heartbeat_interval == 0 || devices.cleanup_interval == 0 {
            return Err(ConfigError::Message(
                "devices.heartbeat_interval and devices.cleanup_interval must be positive".into(),
            ));
        }
        if devices.connection_timeout <= devices.heartbeat_interval {
            return Err(ConfigError::Message(format!(
                "devices.connection_timeout ({}s) must exceed devices.heartbeat_interval ({}s)",
                devices.connection_timeout, devices.heartbeat_interval
            )));
        }
        if devices.send_buffer == 0 || devices.max_devices_per_channel == 0 {
            return Err(ConfigError::Message(
                "devices.send_buffer and devices.max_devices_per_channel must be positive".into(),
            ));
        }

        if self.relay.default_hold_open_ms > self.relay.max_hold_open_ms {
            return Err(ConfigError::Message(
                "relay.default_hold_open_ms exceeds relay.max_hold_open_ms".into(),
            ));
        }

        Ok(())
    }
}

impl StatsConfig {
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.time_zone.parse::<Tz>().map_err(|e| {
            ConfigError::Message(format!("invalid stats.time_zone {:?}: {}", self.time_zone, e))
        })
    }
}

impl RelayConfig {
    /// Resolve the hold-open duration for a channel, honoring an optional request override.
    pub fn hold_open_ms(&self, channel: &str, requested: Option<u64>) -> u64 {
        let configured = self
            .channels
            .get(channel)
            .and_then(|c| c.hold_open_ms)
            .unwrap_or(self.default_hold_open_ms);

        requested.unwrap_or(configured).min(self.max_hold_open_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
            cleanup_interval: default_cleanup_interval(),
            token: None,
            max_devices: default_max_devices(),
            max_devices_per_channel: default_max_devices_per_channel(),
            send_buffer: default_send_buffer(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_hold_open_ms: default_hold_open_ms(),
            max_hold_open_ms: default_max_hold_open_ms(),
            channels: default_channels(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            backend: default_stats_backend(),
            time_zone: default_time_zone(),
            seconds_saved_per_open: default_seconds_saved_per_open(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            idle_timeout_seconds: default_idle_timeout_seconds(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
