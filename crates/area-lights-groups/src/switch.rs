//! Switch platform
//!
//! Mirrors the sensor platform's aggregates and additionally fans on/off
//! commands out to every member light. Switch setup also deregisters the
//! stale switch entity of any area that no longer resolves to members.

use area_lights_config_entries::ConfigEntry;
use area_lights_core::{slugify, Context, EntityId, EntityIdError, STATE_OFF, STATE_ON};
use area_lights_service_registry::{ServiceError, ServiceRegistry};
use area_lights_state_store::StateStore;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::group::{track_members, LightGroup, ListenerGuard};
use crate::hub::Hub;
use crate::resolver::{display_name, resolve_groups, LightRef};
use crate::{CONF_EXCLUDED_ENTITIES, DOMAIN, LIGHT_DOMAIN};

/// Service name for turning lights on
pub const SERVICE_TURN_ON: &str = "turn_on";
/// Service name for turning lights off
pub const SERVICE_TURN_OFF: &str = "turn_off";

/// A live controllable aggregate switch entity
pub struct SwitchGroup {
    /// The underlying group
    pub group: LightGroup,
    /// This switch's entity id (e.g., "switch.lights_kitchen")
    pub entity_id: EntityId,
    states: Arc<StateStore>,
    services: Arc<ServiceRegistry>,
    _listener: ListenerGuard,
}

impl SwitchGroup {
    /// Register the switch, run one update pass, and subscribe to members
    pub fn attach(group: LightGroup, hub: &Hub) -> Result<Self, EntityIdError> {
        let entity_id = EntityId::new("switch", &group.object_id)?;

        debug!(
            name = %group.name,
            total = group.total(),
            "Initializing switch group"
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
            services: hub.services.clone(),
            _listener: listener,
        })
    }

    /// Turn every member light on
    ///
    /// Commands are issued one at a time and awaited to completion. A
    /// dispatch fault is caught here, logged, and not propagated; the
    /// members already commanded keep their new state and the follow-up
    /// aggregate pass reflects the real device states.
    pub async fn turn_on(&self) {
        debug!(group = %self.group.name, "Turning on switch");
        self.command(SERVICE_TURN_ON, STATE_ON).await;
    }

    /// Turn every member light off
    pub async fn turn_off(&self) {
        debug!(group = %self.group.name, "Turning off switch");
        self.command(SERVICE_TURN_OFF, STATE_OFF).await;
    }

    async fn command(&self, service: &str, target_state: &str) {
        match self.fan_out(service).await {
            Ok(()) => {
                let current = self
                    .states
                    .get(&self.entity_id.to_string())
                    .map(|s| s.attributes)
                    .unwrap_or_default();
                self.states
                    .set(self.entity_id.clone(), target_state, current, Context::new());
            }
            Err(err) => {
                error!(group = %self.group.name, error = %err, "Error commanding switch group");
            }
        }
        self.update();
    }

    async fn fan_out(&self, service: &str) -> Result<(), ServiceError> {
        for member in &self.group.members {
            self.services
                .call(
                    LIGHT_DOMAIN,
                    service,
                    json!({ "entity_id": member }),
                    Context::new(),
                )
                .await?;
        }
        Ok(())
    }

    /// Force a re-aggregation pass
    pub fn update(&self) {
        self.group.write_state(&self.entity_id, &self.states);
    }

    /// Whether the aggregate currently reports on
    pub fn is_on(&self) -> bool {
        self.states
            .get(&self.entity_id.to_string())
            .map(|s| s.is_on())
            .unwrap_or(false)
    }
}

/// Set up the switch platform for a config entry
///
/// Resolves the area groups against the entry's exclusion list, removes
/// the stale switch entity of any area that now resolves to zero members,
/// and attaches one switch per remaining area plus the all-areas switch.
/// Also registers the `switch.turn_on` / `switch.turn_off` services
/// routing to the attached switches.
pub fn setup_switch_platform(hub: &Hub, entry: &ConfigEntry) -> Vec<Arc<SwitchGroup>> {
    let excluded: Vec<String> = entry.get(CONF_EXCLUDED_ENTITIES).unwrap_or_default();
    debug!(?excluded, "Setting up area light switches");

    let groups = resolve_groups(
        &hub.registries.areas,
        &hub.registries.entities,
        &hub.registries.devices,
        &excluded,
    );

    // Deregister switches of areas that no longer have member lights
    for area in hub.registries.areas.iter() {
        let display = display_name(&area.name);
        if groups.contains_key(display) {
            continue;
        }

        let stale_id = format!("switch.{}", slugify(&format!("Lights {}", display)));
        let Some(entity) = hub.registries.entities.get(&stale_id) else {
            continue;
        };
        if entity.platform != DOMAIN {
            continue;
        }

        debug!("Removing switch entity for area with no lights: {}", stale_id);
        hub.registries.entities.remove(&stale_id);
        if let Ok(entity_id) = stale_id.parse::<EntityId>() {
            hub.states.remove(&entity_id, Context::new());
        }
    }

    let mut switches = Vec::new();
    let mut all_lights: Vec<LightRef> = Vec::new();

    for (area, resolved) in &groups {
        all_lights.extend(resolved.lights.iter().cloned());
        match SwitchGroup::attach(LightGroup::for_area(area, resolved), hub) {
            Ok(switch) => switches.push(Arc::new(switch)),
            Err(err) => warn!(area = %area, error = %err, "Skipping switch with invalid id"),
        }
    }

    if !all_lights.is_empty() {
        match SwitchGroup::attach(LightGroup::all(&all_lights, &excluded), hub) {
            Ok(switch) => switches.push(Arc::new(switch)),
            Err(err) => warn!(error = %err, "Skipping all-areas switch"),
        }
    }

    register_switch_services(hub, &switches);

    info!("Created {} area light switches", switches.len());
    switches
}

/// Route `switch.turn_on` / `switch.turn_off` calls to the attached switches
fn register_switch_services(hub: &Hub, switches: &[Arc<SwitchGroup>]) {
    for service in [SERVICE_TURN_ON, SERVICE_TURN_OFF] {
        let switches: Vec<Arc<SwitchGroup>> = switches.to_vec();
        hub.services.register("switch", service, move |call| {
            let switches = switches.clone();
            async move {
                for target in call.entity_ids() {
                    let Some(switch) = switches.iter().find(|s| s.entity_id.to_string() == target)
                    else {
                        continue;
                    };
                    if call.service == SERVICE_TURN_ON {
                        switch.turn_on().await;
                    } else {
                        switch.turn_off().await;
                    }
                }
                Ok(())
            }
        });
    }
}
