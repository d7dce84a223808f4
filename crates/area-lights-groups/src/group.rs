//! Aggregate group
//!
//! One type covers both the per-area aggregates and the "All Area Lights"
//! variant; the two differ only in member set and display label. The
//! sensor and switch platforms wrap the same group with their own entity
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use area_lights_core::events::StateChangedData;
use area_lights_core::{slugify, Context, EntityId, STATE_OFF, STATE_ON};
use area_lights_event_bus::EventBus;
use area_lights_state_store::StateStore;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::resolver::{AreaLights, LightRef};
use crate::DOMAIN;

/// Attribute key for the number of member lights currently on
pub const ATTR_COUNT: &str = "count";
/// Attribute key for the total number of member lights
pub const ATTR_TOTAL: &str = "of";

/// Icon shown while at least one member light is on
const ICON_ON: &str = "mdi:lightbulb-on";
/// Icon shown while every member light is off
const ICON_OFF: &str = "mdi:lightbulb";

/// An aggregate group of lights for one area (or all areas)
#[derive(Debug, Clone)]
pub struct LightGroup {
    /// Display label of the area ("Kitchen", or "All")
    pub area: String,
    /// Entity friendly name ("Lights Kitchen", "All Area Lights")
    pub name: String,
    /// Object id segment of the group's entity ids ("lights_kitchen")
    pub object_id: String,
    /// Stable unique id ("area_lights_kitchen")
    pub unique_id: String,
    /// Member light entity ids, in resolver order
    pub members: Vec<String>,
    /// Exclusion-list ids that were candidates for this group
    pub excluded_lights: Vec<String>,
}

impl LightGroup {
    /// Build the group for one area from its resolved lights
    pub fn for_area(area: &str, resolved: &AreaLights) -> Self {
        let name = format!("Lights {}", area);
        Self {
            area: area.to_string(),
            object_id: slugify(&name),
            unique_id: format!("{}_{}", DOMAIN, slugify(area)),
            name,
            members: resolved.lights.iter().map(|l| l.entity_id.clone()).collect(),
            excluded_lights: resolved.excluded.clone(),
        }
    }

    /// Build the all-areas group from every resolved light
    pub fn all(lights: &[LightRef], excluded: &[String]) -> Self {
        let name = "All Area Lights".to_string();
        Self {
            area: "All".to_string(),
            object_id: slugify(&name),
            unique_id: format!("{}_all", DOMAIN),
            name,
            members: lights.iter().map(|l| l.entity_id.clone()).collect(),
            excluded_lights: excluded.to_vec(),
        }
    }

    /// Total number of member lights
    pub fn total(&self) -> usize {
        self.members.len()
    }

    /// Count members currently reporting "on"
    ///
    /// A member with no reported state counts as off.
    pub fn aggregate(&self, states: &StateStore) -> Aggregate {
        let mut lights_on = Vec::new();
        let mut lights_off = Vec::new();

        for member in &self.members {
            match states.get(member) {
                Some(state) if state.is_on() => lights_on.push(member.clone()),
                _ => lights_off.push(member.clone()),
            }
        }

        Aggregate {
            total: self.members.len(),
            lights_on,
            lights_off,
        }
    }

    /// Recompute the aggregate and write it into the state store
    pub fn write_state(&self, entity_id: &EntityId, states: &StateStore) {
        let aggregate = self.aggregate(states);

        debug!(
            group = %self.name,
            count = aggregate.count(),
            total = aggregate.total,
            "Updating aggregate state"
        );

        let mut attributes = HashMap::new();
        attributes.insert("friendly_name".to_string(), json!(self.name));
        attributes.insert("icon".to_string(), json!(aggregate.icon()));
        attributes.insert(ATTR_COUNT.to_string(), json!(aggregate.count()));
        attributes.insert(ATTR_TOTAL.to_string(), json!(aggregate.total));
        attributes.insert("count_of".to_string(), json!(aggregate.count_of()));
        attributes.insert("lights_on".to_string(), json!(aggregate.lights_on));
        attributes.insert("lights_off".to_string(), json!(aggregate.lights_off));
        attributes.insert("excluded_lights".to_string(), json!(self.excluded_lights));

        states.set(
            entity_id.clone(),
            aggregate.state(),
            attributes,
            Context::new(),
        );
    }
}

/// Guard over a group's member subscription
///
/// Dropping the guard aborts the listener task, so a torn-down group can
/// never fire another update.
pub struct ListenerGuard(JoinHandle<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Subscribe a group entity to its members' state changes
///
/// Every STATE_CHANGED event for a member light triggers a re-aggregation
/// pass that rewrites the group entity's state.
pub fn track_members(
    bus: &EventBus,
    states: Arc<StateStore>,
    group: LightGroup,
    entity_id: EntityId,
) -> ListenerGuard {
    let mut rx = bus.subscribe_typed::<StateChangedData>();

    ListenerGuard(tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let changed = event.data.entity_id.to_string();
            if group.members.iter().any(|member| member == &changed) {
                group.write_state(&entity_id, &states);
            }
        }
    }))
}

/// A point-in-time tally of a group's member states
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Total member count
    pub total: usize,
    /// Members currently on
    pub lights_on: Vec<String>,
    /// Members currently off (or with no reported state)
    pub lights_off: Vec<String>,
}

impl Aggregate {
    /// Number of members currently on
    pub fn count(&self) -> usize {
        self.lights_on.len()
    }

    /// Combined "count/total" label
    pub fn count_of(&self) -> String {
        format!("{}/{}", self.count(), self.total)
    }

    /// Aggregate state: "on" iff at least one member is on
    pub fn state(&self) -> &'static str {
        if self.count() > 0 {
            STATE_ON
        } else {
            STATE_OFF
        }
    }

    /// Icon matching the aggregate state
    pub fn icon(&self) -> &'static str {
        if self.count() > 0 {
            ICON_ON
        } else {
            ICON_OFF
        }
    }
}
