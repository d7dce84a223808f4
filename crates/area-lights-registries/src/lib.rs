//! Registries for the home topology
//!
//! This crate provides the registries the area resolver joins across:
//! - Entities (EntityRegistry)
//! - Devices (DeviceRegistry)
//! - Areas (AreaRegistry)
//!
//! All registries use JSON persistence in the `.storage/` directory
//! with versioning for migrations.

pub mod storage;

pub mod area_registry;
pub mod device_registry;
pub mod entity_registry;

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};

pub use area_registry::{AreaEntry, AreaRegistry, AreaRegistryData};
pub use device_registry::{DeviceEntry, DeviceRegistry, DeviceRegistryData};
pub use entity_registry::{EntityEntry, EntityRegistry, EntityRegistryData};

use std::sync::Arc;

/// All registries bundled together
pub struct Registries {
    pub storage: Arc<Storage>,
    pub entities: EntityRegistry,
    pub devices: DeviceRegistry,
    pub areas: AreaRegistry,
}

impl Registries {
    /// Create new registries with the given config directory
    pub fn new(config_dir: impl AsRef<std::path::Path>) -> Self {
        let storage = Arc::new(Storage::new(config_dir));

        Self {
            entities: EntityRegistry::new(storage.clone()),
            devices: DeviceRegistry::new(storage.clone()),
            areas: AreaRegistry::new(storage.clone()),
            storage,
        }
    }

    /// Load all registries from storage
    pub async fn load_all(&self) -> StorageResult<()> {
        self.entities.load().await?;
        self.devices.load().await?;
        self.areas.load().await?;
        Ok(())
    }

    /// Save all registries to storage
    pub async fn save_all(&self) -> StorageResult<()> {
        self.entities.save().await?;
        self.devices.save().await?;
        self.areas.save().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_registries_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let registries = Registries::new(temp_dir.path());

        let area = registries.areas.create("Kitchen");
        let device = registries.devices.create(Some("Hue Bridge"), Some(&area.id));

        registries
            .entities
            .get_or_create("hue", "light.kitchen", Some("uid1"), Some(&device.id));

        registries.save_all().await.unwrap();

        let registries2 = Registries::new(temp_dir.path());
        registries2.load_all().await.unwrap();

        assert_eq!(registries2.entities.len(), 1);
        assert_eq!(registries2.devices.len(), 1);
        assert_eq!(registries2.areas.len(), 1);

        let entity = registries2.entities.get("light.kitchen").unwrap();
        let device = registries2
            .devices
            .get(entity.device_id.as_ref().unwrap())
            .unwrap();
        assert_eq!(device.area_id.as_deref(), Some(area.id.as_str()));
    }
}
