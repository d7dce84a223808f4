//! Entity Registry
//!
//! Tracks all registered entities with their area/device linkage and
//! multiple indexes for fast lookups.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::{Storable, Storage, StorageFile, StorageResult};

/// Storage key for entity registry
pub const STORAGE_KEY: &str = "core.entity_registry";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// A registered entity entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityEntry {
    /// Internal ID (ULID)
    pub id: String,
    /// Full entity ID (domain.object_id)
    pub entity_id: String,
    /// Platform-specific unique identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,

    /// Component/platform that provides this entity
    pub platform: String,

    /// User-set name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Platform default name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,

    /// Assigned area
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_id: Option<String>,
    /// Parent device ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Last modified timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

impl EntityEntry {
    /// Create a new entity entry with minimal required fields
    pub fn new(
        entity_id: impl Into<String>,
        platform: impl Into<String>,
        unique_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string().to_lowercase(),
            entity_id: entity_id.into(),
            unique_id,
            platform: platform.into(),
            name: None,
            original_name: None,
            area_id: None,
            device_id: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Get the domain from entity_id
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or(&self.entity_id)
    }

    /// Friendly name: user-set name, else platform name, else the entity_id
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.original_name.as_deref())
            .unwrap_or(&self.entity_id)
    }
}

/// Entity registry data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityRegistryData {
    /// All registered entities
    pub entities: Vec<EntityEntry>,
}

impl Storable for EntityRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Entity Registry with multi-index support
///
/// Provides O(1) lookups by:
/// - entity_id (primary)
/// - unique_id
/// - device_id (multi)
/// - area_id (multi)
/// - platform (multi)
///
/// Entries are stored as `Arc<EntityEntry>` to avoid cloning on reads.
/// The primary index preserves insertion order.
pub struct EntityRegistry {
    /// Storage backend
    storage: Arc<Storage>,

    /// Primary index: entity_id -> EntityEntry
    by_entity_id: RwLock<IndexMap<String, Arc<EntityEntry>>>,

    /// Index: unique_id -> entity_id
    by_unique_id: DashMap<String, String>,

    /// Index: device_id -> set of entity_ids
    by_device_id: DashMap<String, HashSet<String>>,

    /// Index: area_id -> set of entity_ids
    by_area_id: DashMap<String, HashSet<String>>,

    /// Index: platform -> set of entity_ids
    by_platform: DashMap<String, HashSet<String>>,
}

impl EntityRegistry {
    /// Create a new entity registry
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            by_entity_id: RwLock::new(IndexMap::new()),
            by_unique_id: DashMap::new(),
            by_device_id: DashMap::new(),
            by_area_id: DashMap::new(),
            by_platform: DashMap::new(),
        }
    }

    /// Load from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load::<EntityRegistryData>(STORAGE_KEY).await? {
            info!(
                "Loading {} entities from storage (v{}.{})",
                storage_file.data.entities.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entities {
                self.index_entry(Arc::new(entry));
            }
        }
        Ok(())
    }

    /// Save to storage
    pub async fn save(&self) -> StorageResult<()> {
        let entities: Vec<EntityEntry> = self
            .by_entity_id
            .read()
            .map(|e| e.values().map(|v| (**v).clone()).collect())
            .unwrap_or_default();

        let data = EntityRegistryData { entities };

        let storage_file =
            StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION, STORAGE_MINOR_VERSION);

        self.storage.save(&storage_file).await?;
        debug!(
            "Saved {} entities to storage",
            self.by_entity_id.read().map(|e| e.len()).unwrap_or(0)
        );
        Ok(())
    }

    /// Index an entry in all indexes
    fn index_entry(&self, entry: Arc<EntityEntry>) {
        let entity_id = entry.entity_id.clone();

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert(unique_id.clone(), entity_id.clone());
        }

        if let Some(ref device_id) = entry.device_id {
            self.by_device_id
                .entry(device_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }

        if let Some(ref area_id) = entry.area_id {
            self.by_area_id
                .entry(area_id.clone())
                .or_default()
                .insert(entity_id.clone());
        }

        self.by_platform
            .entry(entry.platform.clone())
            .or_default()
            .insert(entity_id.clone());

        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.insert(entity_id, entry);
        }
    }

    /// Remove an entry from all indexes
    fn unindex_entry(&self, entry: &EntityEntry) {
        let entity_id = &entry.entity_id;

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id.remove(unique_id);
        }

        if let Some(ref device_id) = entry.device_id {
            if let Some(mut ids) = self.by_device_id.get_mut(device_id) {
                ids.remove(entity_id);
            }
        }

        if let Some(ref area_id) = entry.area_id {
            if let Some(mut ids) = self.by_area_id.get_mut(area_id) {
                ids.remove(entity_id);
            }
        }

        if let Some(mut ids) = self.by_platform.get_mut(&entry.platform) {
            ids.remove(entity_id);
        }

        if let Ok(mut idx) = self.by_entity_id.write() {
            idx.shift_remove(entity_id);
        }
    }

    /// Get entity by entity_id
    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .ok()
            .and_then(|idx| idx.get(entity_id).cloned())
    }

    /// Get entity by unique_id
    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<EntityEntry>> {
        self.by_unique_id
            .get(unique_id)
            .and_then(|entity_id| self.get(&entity_id))
    }

    /// Get all entities for a device
    pub fn get_by_device_id(&self, device_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_device_id
            .get(device_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get all entities in an area
    pub fn get_by_area_id(&self, area_id: &str) -> Vec<Arc<EntityEntry>> {
        self.by_area_id
            .get(area_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get all entities for a platform
    pub fn get_by_platform(&self, platform: &str) -> Vec<Arc<EntityEntry>> {
        self.by_platform
            .get(platform)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get or create an entity entry
    ///
    /// If an entity with the same unique_id or entity_id exists, returns it.
    /// Otherwise creates a new entry.
    pub fn get_or_create(
        &self,
        platform: &str,
        entity_id: &str,
        unique_id: Option<&str>,
        device_id: Option<&str>,
    ) -> Arc<EntityEntry> {
        if let Some(uid) = unique_id {
            if let Some(existing) = self.get_by_unique_id(uid) {
                debug!("Found existing entity by unique_id: {}", existing.entity_id);
                return existing;
            }
        }

        if let Some(existing) = self.get(entity_id) {
            return existing;
        }

        let mut entry = EntityEntry::new(entity_id, platform, unique_id.map(String::from));
        entry.device_id = device_id.map(String::from);

        let entry = Arc::new(entry);
        info!("Registered entity: {}", entity_id);
        self.index_entry(Arc::clone(&entry));
        entry
    }

    /// Update an entity
    ///
    /// Returns the updated entry, or None if the entity doesn't exist.
    pub fn update<F>(&self, entity_id: &str, f: F) -> Option<Arc<EntityEntry>>
    where
        F: FnOnce(&mut EntityEntry),
    {
        let existing = self.get(entity_id)?;

        self.unindex_entry(&existing);

        let mut entry = (*existing).clone();
        f(&mut entry);
        entry.modified_at = Utc::now();

        let new_arc = Arc::new(entry);
        self.index_entry(Arc::clone(&new_arc));

        Some(new_arc)
    }

    /// Remove an entity by entity_id
    pub fn remove(&self, entity_id: &str) -> Option<Arc<EntityEntry>> {
        let entry = self.get(entity_id)?;
        self.unindex_entry(&entry);
        info!("Removed entity: {}", entity_id);
        Some(entry)
    }

    /// Get count of entities
    pub fn len(&self) -> usize {
        self.by_entity_id.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries in insertion order
    pub fn all(&self) -> Vec<Arc<EntityEntry>> {
        self.by_entity_id
            .read()
            .map(|idx| idx.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_registry() -> (TempDir, EntityRegistry) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        (temp_dir, EntityRegistry::new(storage))
    }

    #[test]
    fn test_get_or_create() {
        let (_dir, registry) = make_registry();

        let entity = registry.get_or_create("hue", "light.kitchen", Some("uid1"), None);
        assert_eq!(entity.entity_id, "light.kitchen");
        assert_eq!(entity.domain(), "light");

        // Same unique_id returns the existing entry
        let again = registry.get_or_create("hue", "light.other", Some("uid1"), None);
        assert_eq!(again.entity_id, "light.kitchen");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_moves_indexes() {
        let (_dir, registry) = make_registry();

        registry.get_or_create("hue", "light.kitchen", None, None);
        registry.update("light.kitchen", |e| {
            e.area_id = Some("area1".to_string());
        });

        assert_eq!(registry.get_by_area_id("area1").len(), 1);

        registry.update("light.kitchen", |e| {
            e.area_id = Some("area2".to_string());
        });

        assert!(registry.get_by_area_id("area1").is_empty());
        assert_eq!(registry.get_by_area_id("area2").len(), 1);
    }

    #[test]
    fn test_remove() {
        let (_dir, registry) = make_registry();

        registry.get_or_create("area_lights", "switch.lights_garage", None, None);
        assert!(registry.get("switch.lights_garage").is_some());

        let removed = registry.remove("switch.lights_garage").unwrap();
        assert_eq!(removed.entity_id, "switch.lights_garage");
        assert!(registry.get("switch.lights_garage").is_none());
        assert!(registry.get_by_platform("area_lights").is_empty());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let (_dir, registry) = make_registry();

        registry.get_or_create("hue", "light.kitchen", None, None);
        assert_eq!(
            registry.get("light.kitchen").unwrap().display_name(),
            "light.kitchen"
        );

        registry.update("light.kitchen", |e| {
            e.original_name = Some("Kitchen Ceiling".to_string());
        });
        assert_eq!(
            registry.get("light.kitchen").unwrap().display_name(),
            "Kitchen Ceiling"
        );

        registry.update("light.kitchen", |e| {
            e.name = Some("My Lamp".to_string());
        });
        assert_eq!(
            registry.get("light.kitchen").unwrap().display_name(),
            "My Lamp"
        );
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let registry = EntityRegistry::new(storage.clone());
            registry.get_or_create("hue", "light.kitchen", Some("uid1"), Some("dev1"));
            registry.update("light.kitchen", |e| {
                e.area_id = Some("area1".to_string());
            });
            registry.save().await.unwrap();
        }

        let registry = EntityRegistry::new(storage);
        registry.load().await.unwrap();

        assert_eq!(registry.len(), 1);
        let entity = registry.get("light.kitchen").unwrap();
        assert_eq!(entity.area_id.as_deref(), Some("area1"));
        assert_eq!(registry.get_by_device_id("dev1").len(), 1);
    }
}
