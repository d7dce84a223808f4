//! Setup and options flow
//!
//! Two entry points share one resolution step: the setup flow creates the
//! single config entry holding the exclusion list, the options flow
//! replaces that list wholesale and reloads the entry so the sensor and
//! switch platforms are rebuilt against the new exclusions.

use std::collections::{BTreeMap, HashMap};

use area_lights_config_entries::{ConfigEntriesError, ConfigEntry, ConfigEntryUpdate};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::hub::Hub;
use crate::resolver::{lights_by_area, LightRef};
use crate::{CONF_EXCLUDED_ENTITIES, DOMAIN};

/// Abort reason when a config entry already exists
pub const REASON_SINGLE_INSTANCE: &str = "single_instance_allowed";

/// Flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("config entry error: {0}")]
    ConfigEntries(#[from] ConfigEntriesError),
}

/// Result of one flow step
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show a form and wait for user input
    Form {
        step_id: String,
        fields: Vec<MultiSelectField>,
    },
    /// The flow completed and persisted its result
    CreateEntry {
        title: String,
        data: HashMap<String, serde_json::Value>,
    },
    /// The flow refused to proceed
    Abort { reason: String },
}

/// A per-area multi-select of lights to exclude
#[derive(Debug, Clone, Serialize)]
pub struct MultiSelectField {
    /// Area display name
    pub name: String,
    /// Selectable lights
    pub options: Vec<SelectOption>,
    /// Pre-selected entity ids
    pub default: Vec<String>,
}

/// One selectable light
#[derive(Debug, Clone, Serialize)]
pub struct SelectOption {
    /// Raw entity id, the value the exclusion list stores
    pub value: String,
    /// "Name (entity_id)" label
    pub label: String,
}

/// User input for a form step: area display name -> selected entity ids
pub type FlowInput = HashMap<String, Vec<String>>;

/// The initial setup flow
pub struct AreaLightsConfigFlow {
    hub: Hub,
}

impl AreaLightsConfigFlow {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    /// The "user" step: render the exclusion form, or create the entry
    ///
    /// Aborts with "single_instance_allowed" if an entry already exists.
    pub async fn step_user(&self, user_input: Option<&FlowInput>) -> Result<FlowResult, FlowError> {
        if self.hub.config_entries.has_entries(DOMAIN) {
            return Ok(FlowResult::Abort {
                reason: REASON_SINGLE_INSTANCE.to_string(),
            });
        }

        let candidates = candidates(&self.hub);

        if let Some(input) = user_input {
            let excluded = flatten_selections(&candidates, input);
            debug!(?excluded, "Creating entry with excluded entities");

            let mut data = HashMap::new();
            data.insert(CONF_EXCLUDED_ENTITIES.to_string(), json!(excluded));

            let entry = self
                .hub
                .config_entries
                .add(
                    ConfigEntry::new(DOMAIN, "Area Lights")
                        .with_data(data.clone())
                        .with_unique_id(DOMAIN),
                )
                .await?;
            self.hub.config_entries.setup(&entry.entry_id).await?;

            return Ok(FlowResult::CreateEntry {
                title: "Area Lights".to_string(),
                data,
            });
        }

        Ok(FlowResult::Form {
            step_id: "user".to_string(),
            fields: build_fields(&candidates, &[]),
        })
    }
}

/// The options flow for an existing entry
pub struct AreaLightsOptionsFlow {
    hub: Hub,
    entry_id: String,
}

impl AreaLightsOptionsFlow {
    pub fn new(hub: Hub, entry_id: impl Into<String>) -> Self {
        Self {
            hub,
            entry_id: entry_id.into(),
        }
    }

    /// The "init" step: render the pre-selected form, or replace the list
    ///
    /// On submission the exclusion list is replaced wholesale and the entry
    /// reloaded so the dependent platforms pick up the change immediately.
    pub async fn step_init(&self, user_input: Option<&FlowInput>) -> Result<FlowResult, FlowError> {
        let entry = self
            .hub
            .config_entries
            .get(&self.entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(self.entry_id.clone()))?;

        let candidates = candidates(&self.hub);
        let current: Vec<String> = entry.get(CONF_EXCLUDED_ENTITIES).unwrap_or_default();

        if let Some(input) = user_input {
            let excluded = flatten_selections(&candidates, input);
            debug!(from = ?current, to = ?excluded, "Updating excluded entities");

            let mut data = entry.data.clone();
            data.insert(CONF_EXCLUDED_ENTITIES.to_string(), json!(excluded));

            self.hub
                .config_entries
                .update(&self.entry_id, ConfigEntryUpdate::new().data(data))
                .await?;
            self.hub.config_entries.reload(&self.entry_id).await?;

            return Ok(FlowResult::CreateEntry {
                title: String::new(),
                data: HashMap::new(),
            });
        }

        Ok(FlowResult::Form {
            step_id: "init".to_string(),
            fields: build_fields(&candidates, &current),
        })
    }
}

/// Resolve the full candidate set (no exclusions applied)
fn candidates(hub: &Hub) -> BTreeMap<String, Vec<LightRef>> {
    lights_by_area(
        &hub.registries.areas,
        &hub.registries.entities,
        &hub.registries.devices,
        &[],
    )
}

/// Build one multi-select field per area
///
/// Each field pre-selects the subset of the exclusion list belonging to
/// that area.
fn build_fields(
    candidates: &BTreeMap<String, Vec<LightRef>>,
    excluded: &[String],
) -> Vec<MultiSelectField> {
    candidates
        .iter()
        .map(|(area, lights)| MultiSelectField {
            name: area.clone(),
            options: lights
                .iter()
                .map(|light| SelectOption {
                    value: light.entity_id.clone(),
                    label: format!("{} ({})", light.name, light.entity_id),
                })
                .collect(),
            default: excluded
                .iter()
                .filter(|id| lights.iter().any(|l| l.entity_id == **id))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Flatten the per-area selections into one exclusion list
fn flatten_selections(
    candidates: &BTreeMap<String, Vec<LightRef>>,
    input: &FlowInput,
) -> Vec<String> {
    let mut excluded = Vec::new();
    for area in candidates.keys() {
        if let Some(selected) = input.get(area) {
            excluded.extend(selected.iter().cloned());
        }
    }
    excluded
}
