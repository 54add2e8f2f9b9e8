mod settings;

pub use settings::{
    ApiConfig, ChannelConfig, DatabaseConfig, DeviceConfig, OtelConfig, RelayConfig,
    ServerConfig, Settings, StatsConfig,
};
