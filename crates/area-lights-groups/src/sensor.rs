//! Sensor platform
//!
//! One read-only aggregate sensor per resolved area, plus the
//! "All Area Lights" sensor covering every resolved light.

use area_lights_config_entries::ConfigEntry;
use area_lights_core::{EntityId, EntityIdError, State};
use area_lights_state_store::StateStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::group::{track_members, LightGroup, ListenerGuard};
use crate::hub::Hub;
use crate::resolver::{resolve_groups, LightRef};
use crate::{CONF_EXCLUDED_ENTITIES, DOMAIN};

/// A live aggregate sensor entity
pub struct SensorGroup {
    /// The underlying group
    pub group: LightGroup,
    /// This sensor's entity id (e.g., "sensor.lights_kitchen")
    pub entity_id: EntityId,
    states: Arc<StateStore>,
    _listener: ListenerGuard,
}

impl SensorGroup {
    /// Register the sensor, run one update pass, and subscribe to members
    pub fn attach(group: LightGroup, hub: &Hub) -> Result<Self, EntityIdError> {
        let entity_id = EntityId::new("sensor", &group.object_id)?;

        debug!(
            name = %group.name,
            total = group.total(),
            "Initializing sensor group"
        );

        hub.registries.entities.get_or_create(
            DOMAIN,
            &entity_id.to_string(),
            Some(&group.unique_id),
            None,
        );

        let listener = track_members(&hub.bus, hub.states.clone(), group.clone(), entity_id.clone());

        group.write_state(&entity_id, &hub.states);

        Ok(Self {
            group,
            entity_id,
            states: hub.states.clone(),
            _listener: listener,
        })
    }

    /// Force a re-aggregation pass
    pub fn update(&self) {
        self.group.write_state(&self.entity_id, &self.states);
    }

    /// The sensor's current state, if written
    pub fn state(&self) -> Option<State> {
        self.states.get(&self.entity_id.to_string())
    }
}

/// Set up the sensor platform for a config entry
///
/// Resolves the area groups against the entry's exclusion list and
/// attaches one sensor per area plus the all-areas sensor. Areas with
/// zero members produce no sensor.
pub fn setup_sensor_platform(hub: &Hub, entry: &ConfigEntry) -> Vec<SensorGroup> {
    let excluded: Vec<String> = entry.get(CONF_EXCLUDED_ENTITIES).unwrap_or_default();
    debug!(?excluded, "Setting up area light sensors");

    let groups = resolve_groups(
        &hub.registries.areas,
        &hub.registries.entities,
        &hub.registries.devices,
        &excluded,
    );

    let mut sensors = Vec::new();
    let mut all_lights: Vec<LightRef> = Vec::new();

    for (area, resolved) in &groups {
        all_lights.extend(resolved.lights.iter().cloned());
        match SensorGroup::attach(LightGroup::for_area(area, resolved), hub) {
            Ok(sensor) => sensors.push(sensor),
            Err(err) => warn!(area = %area, error = %err, "Skipping sensor with invalid id"),
        }
    }

    if !all_lights.is_empty() {
        match SensorGroup::attach(LightGroup::all(&all_lights, &excluded), hub) {
            Ok(sensor) => sensors.push(sensor),
            Err(err) => warn!(error = %err, "Skipping all-areas sensor"),
        }
    }

    info!("Created {} area light sensors", sensors.len());
    sensors
}
