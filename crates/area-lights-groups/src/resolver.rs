//! Area resolution
//!
//! Joins the area, entity, and device registries to produce, for each
//! area, the set of light entities belonging to it. An entity belongs to
//! an area directly via its own `area_id`, or indirectly via its owning
//! device's `area_id`; entities with neither are dropped. The exclusion
//! list removes members by raw entity id.

use std::collections::BTreeMap;

use area_lights_registries::{AreaRegistry, DeviceRegistry, EntityRegistry};
use tracing::debug;

use crate::LIGHT_DOMAIN;

/// A resolved light: entity id plus friendly name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightRef {
    pub entity_id: String,
    pub name: String,
}

/// The resolved lights of one area
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaLights {
    /// Member lights, ordered by name (case-insensitive)
    pub lights: Vec<LightRef>,
    /// Same-area candidates suppressed by the exclusion list
    pub excluded: Vec<String>,
}

/// Presentation name of an area
///
/// A case-insensitive "area_" prefix is stripped: "area_Garage" shows as
/// "Garage".
pub fn display_name(area_name: &str) -> &str {
    match area_name.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("area_") => &area_name[5..],
        _ => area_name,
    }
}

/// Resolve every area's member lights, honoring the exclusion list
///
/// Returns a map from area display name to that area's lights, with areas
/// resolving to zero members omitted. Iteration order is alphabetical by
/// display name; member lists are ordered by light name.
pub fn resolve_groups(
    areas: &AreaRegistry,
    entities: &EntityRegistry,
    devices: &DeviceRegistry,
    excluded: &[String],
) -> BTreeMap<String, AreaLights> {
    let mut by_area: BTreeMap<String, AreaLights> = BTreeMap::new();

    for entity in entities.all() {
        if entity.domain() != LIGHT_DOMAIN {
            continue;
        }

        // An explicit entity area always wins over the device's area
        let area_id = match &entity.area_id {
            Some(area_id) => Some(area_id.clone()),
            None => entity
                .device_id
                .as_deref()
                .and_then(|device_id| devices.get(device_id))
                .and_then(|device| device.area_id.clone()),
        };

        let Some(area_id) = area_id else {
            continue;
        };
        let Some(area) = areas.get(&area_id) else {
            continue;
        };

        let group = by_area.entry(display_name(&area.name).to_string()).or_default();

        if excluded.iter().any(|id| id == &entity.entity_id) {
            group.excluded.push(entity.entity_id.clone());
        } else {
            debug!(
                entity_id = %entity.entity_id,
                area = %area.name,
                "Light resolved to area"
            );
            group.lights.push(LightRef {
                entity_id: entity.entity_id.clone(),
                name: entity.display_name().to_string(),
            });
        }
    }

    by_area.retain(|_, group| !group.lights.is_empty());

    for group in by_area.values_mut() {
        group
            .lights
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        group.excluded.sort();
    }

    by_area
}

/// Resolve every area's member lights as plain descriptor lists
///
/// The config flow uses this with an empty exclusion list to enumerate
/// candidates.
pub fn lights_by_area(
    areas: &AreaRegistry,
    entities: &EntityRegistry,
    devices: &DeviceRegistry,
    excluded: &[String],
) -> BTreeMap<String, Vec<LightRef>> {
    resolve_groups(areas, entities, devices, excluded)
        .into_iter()
        .map(|(area, group)| (area, group.lights))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use area_lights_registries::Registries;
    use tempfile::TempDir;

    fn make_registries() -> (TempDir, Registries) {
        let temp_dir = TempDir::new().unwrap();
        let registries = Registries::new(temp_dir.path());
        (temp_dir, registries)
    }

    fn add_light(registries: &Registries, entity_id: &str, name: &str, area_id: Option<&str>) {
        registries
            .entities
            .get_or_create("hue", entity_id, None, None);
        let name = name.to_string();
        let area_id = area_id.map(String::from);
        registries.entities.update(entity_id, |e| {
            e.original_name = Some(name);
            e.area_id = area_id;
        });
    }

    #[test]
    fn test_display_name_strips_prefix() {
        assert_eq!(display_name("area_Garage"), "Garage");
        assert_eq!(display_name("AREA_Garage"), "Garage");
        assert_eq!(display_name("Kitchen"), "Kitchen");
        assert_eq!(display_name("area"), "area");
    }

    #[test]
    fn test_direct_area_assignment() {
        let (_dir, registries) = make_registries();

        let kitchen = registries.areas.create("Kitchen");
        add_light(&registries, "light.a", "Ceiling", Some(&kitchen.id));
        add_light(&registries, "light.b", "Counter", Some(&kitchen.id));

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        assert_eq!(groups.len(), 1);
        let kitchen_group = &groups["Kitchen"];
        assert_eq!(kitchen_group.lights.len(), 2);
        assert_eq!(kitchen_group.lights[0].name, "Ceiling");
        assert_eq!(kitchen_group.lights[1].name, "Counter");
    }

    #[test]
    fn test_device_area_fallback() {
        let (_dir, registries) = make_registries();

        let garage = registries.areas.create("Garage");
        let device = registries.devices.create(Some("Garage Hub"), Some(&garage.id));

        registries
            .entities
            .get_or_create("hue", "light.c", None, Some(&device.id));

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        assert_eq!(groups["Garage"].lights[0].entity_id, "light.c");
    }

    #[test]
    fn test_entity_area_beats_device_area() {
        let (_dir, registries) = make_registries();

        let kitchen = registries.areas.create("Kitchen");
        let garage = registries.areas.create("Garage");
        let device = registries.devices.create(None, Some(&garage.id));

        registries
            .entities
            .get_or_create("hue", "light.a", None, Some(&device.id));
        let kitchen_id = kitchen.id.clone();
        registries.entities.update("light.a", |e| {
            e.area_id = Some(kitchen_id);
        });

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        assert!(groups.contains_key("Kitchen"));
        assert!(!groups.contains_key("Garage"));
    }

    #[test]
    fn test_unresolvable_entities_dropped() {
        let (_dir, registries) = make_registries();

        registries.areas.create("Kitchen");
        // No area, no device
        add_light(&registries, "light.orphan", "Orphan", None);
        // Not a light
        let kitchen = registries.areas.get_by_name("Kitchen").unwrap();
        registries
            .entities
            .get_or_create("hue", "sensor.temp", None, None);
        let kitchen_id = kitchen.id.clone();
        registries.entities.update("sensor.temp", |e| {
            e.area_id = Some(kitchen_id);
        });

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        assert!(groups.is_empty());
    }

    #[test]
    fn test_exclusion_removes_member_and_is_recorded() {
        let (_dir, registries) = make_registries();

        let kitchen = registries.areas.create("Kitchen");
        add_light(&registries, "light.a", "Ceiling", Some(&kitchen.id));
        add_light(&registries, "light.b", "Counter", Some(&kitchen.id));

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &["light.b".to_string()],
        );

        let kitchen_group = &groups["Kitchen"];
        assert_eq!(kitchen_group.lights.len(), 1);
        assert_eq!(kitchen_group.lights[0].entity_id, "light.a");
        assert_eq!(kitchen_group.excluded, vec!["light.b"]);
    }

    #[test]
    fn test_fully_excluded_area_omitted() {
        let (_dir, registries) = make_registries();

        let garage = registries.areas.create("area_Garage");
        add_light(&registries, "light.c", "Shelf", Some(&garage.id));

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &["light.c".to_string()],
        );

        assert!(groups.is_empty());
    }

    #[test]
    fn test_empty_registries_yield_empty_map() {
        let (_dir, registries) = make_registries();

        let groups = resolve_groups(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        assert!(groups.is_empty());
    }

    #[test]
    fn test_area_iteration_is_alphabetical_by_display_name() {
        let (_dir, registries) = make_registries();

        let garage = registries.areas.create("area_Garage");
        let kitchen = registries.areas.create("Kitchen");
        let bedroom = registries.areas.create("Bedroom");
        add_light(&registries, "light.g", "G", Some(&garage.id));
        add_light(&registries, "light.k", "K", Some(&kitchen.id));
        add_light(&registries, "light.b", "B", Some(&bedroom.id));

        let groups = lights_by_area(
            &registries.areas,
            &registries.entities,
            &registries.devices,
            &[],
        );

        let names: Vec<&String> = groups.keys().collect();
        assert_eq!(names, ["Bedroom", "Garage", "Kitchen"]);
    }
}
