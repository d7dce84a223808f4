//! Platform surface the integration runs against
//!
//! Bundles the event bus, state store, service registry, topology
//! registries, and config entry manager behind one handle. The component
//! only ever reads the registries and requests mutation through their
//! update APIs; the single exception is the stale switch removal in the
//! switch platform.

use std::path::Path;
use std::sync::Arc;

use area_lights_config_entries::ConfigEntries;
use area_lights_event_bus::EventBus;
use area_lights_registries::{Registries, StorageResult};
use area_lights_service_registry::ServiceRegistry;
use area_lights_state_store::StateStore;

/// Shared handles to the platform services
#[derive(Clone)]
pub struct Hub {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State store for entity states
    pub states: Arc<StateStore>,
    /// Service registry for command dispatch
    pub services: Arc<ServiceRegistry>,
    /// Area/device/entity registries
    pub registries: Arc<Registries>,
    /// Config entry manager
    pub config_entries: Arc<ConfigEntries>,
}

impl Hub {
    /// Create a new hub rooted at the given config directory
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());
        let registries = Arc::new(Registries::new(config_dir));
        let config_entries = Arc::new(ConfigEntries::new(registries.storage.clone()));

        Self {
            bus,
            states,
            services,
            registries,
            config_entries,
        }
    }

    /// Load registries and config entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        self.registries.load_all().await?;
        self.config_entries.load().await?;
        Ok(())
    }
}
