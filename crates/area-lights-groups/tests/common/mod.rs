//! Shared fixtures for integration tests
//!
//! Provides a platform instance with real light.turn_on / light.turn_off
//! handlers that flip states in the state store, plus helpers for
//! populating the topology registries.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use area_lights_config_entries::{ConfigEntry, ConfigEntryUpdate};
use area_lights_core::{Context, EntityId, ServiceCall, STATE_OFF, STATE_ON};
use area_lights_groups::{Hub, CONF_EXCLUDED_ENTITIES, DOMAIN};
use area_lights_service_registry::ServiceError;
use serde_json::json;
use tempfile::TempDir;

/// A hub with light services wired to the state store
pub struct TestPlatform {
    pub hub: Hub,
    /// Light entity ids whose commands fail with a dispatch fault
    failing: Arc<Mutex<HashSet<String>>>,
    _dir: TempDir,
}

impl TestPlatform {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let hub = Hub::new(dir.path());
        let failing = Arc::new(Mutex::new(HashSet::new()));

        for (service, state) in [("turn_on", STATE_ON), ("turn_off", STATE_OFF)] {
            let states = hub.states.clone();
            let failing = failing.clone();
            hub.services
                .register("light", service, move |call: ServiceCall| {
                    let states = states.clone();
                    let failing = failing.clone();
                    async move {
                        for target in call.entity_ids() {
                            if failing.lock().unwrap().contains(&target) {
                                return Err(ServiceError::CallFailed(format!(
                                    "{} is unreachable",
                                    target
                                )));
                            }
                            let entity_id: EntityId = target
                                .parse()
                                .map_err(|e| ServiceError::CallFailed(format!("{}", e)))?;
                            states.set(entity_id, state, HashMap::new(), call.context.clone());
                        }
                        Ok(())
                    }
                });
        }

        Self {
            hub,
            failing,
            _dir: dir,
        }
    }

    /// Create an area, returning its id
    pub fn add_area(&self, name: &str) -> String {
        self.hub.registries.areas.create(name).id.clone()
    }

    /// Create a device assigned to an area, returning its id
    pub fn add_device(&self, name: &str, area_id: &str) -> String {
        self.hub
            .registries
            .devices
            .create(Some(name), Some(area_id))
            .id
            .clone()
    }

    /// Register a light with an initial state
    pub fn add_light(
        &self,
        entity_id: &str,
        name: &str,
        area_id: Option<&str>,
        device_id: Option<&str>,
        initial_state: &str,
    ) {
        self.hub
            .registries
            .entities
            .get_or_create("hue", entity_id, None, device_id);

        let name = name.to_string();
        let area_id = area_id.map(String::from);
        self.hub.registries.entities.update(entity_id, |e| {
            e.original_name = Some(name);
            e.area_id = area_id;
        });

        let parsed: EntityId = entity_id.parse().unwrap();
        self.hub
            .states
            .set(parsed, initial_state, HashMap::new(), Context::new());
    }

    /// Make a light's commands fail with a dispatch fault
    pub fn fail_light(&self, entity_id: &str) {
        self.failing.lock().unwrap().insert(entity_id.to_string());
    }

    /// Create and set up the integration's config entry
    pub async fn create_entry(&self, excluded: &[&str]) -> ConfigEntry {
        let mut data = HashMap::new();
        data.insert(CONF_EXCLUDED_ENTITIES.to_string(), json!(excluded));

        let entry = self
            .hub
            .config_entries
            .add(
                ConfigEntry::new(DOMAIN, "Area Lights")
                    .with_data(data)
                    .with_unique_id(DOMAIN),
            )
            .await
            .unwrap();
        self.hub.config_entries.setup(&entry.entry_id).await.unwrap();
        entry
    }

    /// Replace an entry's exclusion list
    pub async fn set_exclusions(&self, entry_id: &str, excluded: &[&str]) -> ConfigEntry {
        let entry = self.hub.config_entries.get(entry_id).unwrap();
        let mut data = entry.data.clone();
        data.insert(CONF_EXCLUDED_ENTITIES.to_string(), json!(excluded));
        self.hub
            .config_entries
            .update(entry_id, ConfigEntryUpdate::new().data(data))
            .await
            .unwrap()
    }

    /// Build the Kitchen + area_Garage topology from the scenario tests
    ///
    /// Kitchen: light.a (on), light.b (off); area_Garage: light.c (off).
    pub fn scenario_topology(&self) {
        let kitchen = self.add_area("Kitchen");
        let garage = self.add_area("area_Garage");

        self.add_light("light.a", "Ceiling", Some(&kitchen), None, STATE_ON);
        self.add_light("light.b", "Counter", Some(&kitchen), None, STATE_OFF);

        let device = self.add_device("Garage Hub", &garage);
        self.add_light("light.c", "Shelf", None, Some(&device), STATE_OFF);
    }
}
