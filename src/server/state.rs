use std::sync::Arc;
use std::time::Instant;

use config::ConfigError;

use crate::config::Settings;
use crate::device::{DeviceRegistry, RegistryLimits};
use crate::postgres::PostgresPool;
use crate::relay::CommandRelay;
use crate::stats::{StatsBackend, StatsStore};
use crate::triggers::OpenService;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<DeviceRegistry>,
    pub relay: Arc<CommandRelay>,
    pub stats_store: Arc<StatsStore>,
    pub open_service: Arc<OpenService>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the registry, relay, stats store and open service together.
    ///
    /// The stats backend must already be initialized.
    pub fn new(
        settings: Settings,
        stats_backend: Arc<dyn StatsBackend>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Result<Self, ConfigError> {
        let time_zone = settings.stats.time_zone()?;

        let registry = Arc::new(DeviceRegistry::with_limits(RegistryLimits::from(
            &settings.devices,
        )));
        let relay = Arc::new(CommandRelay::with_known_channels(
            registry.clone(),
            settings.relay.channels.keys().cloned(),
        ));
        let stats_store = Arc::new(StatsStore::new(stats_backend, time_zone));
        let open_service = Arc::new(OpenService::new(
            relay.clone(),
            stats_store.clone(),
            settings.relay.clone(),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            registry,
            relay,
            stats_store,
            open_service,
            postgres_pool,
            start_time: Instant::now(),
        })
    }
}
