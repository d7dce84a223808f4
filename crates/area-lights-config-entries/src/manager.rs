//! Config Entries Manager
//!
//! Manages the lifecycle of configuration entries: persistence, setup,
//! unload, and the reload the options flow triggers after changing the
//! exclusion list.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use area_lights_registries::{Storable, Storage, StorageFile, StorageResult};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] area_lights_registries::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    /// All config entries
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Future type for async setup handlers
pub type SetupFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Setup handler function type
///
/// Called with the entry on setup; integrations register one per domain to
/// build their entity platforms.
pub type SetupHandler = Arc<dyn Fn(ConfigEntry) -> SetupFuture + Send + Sync + 'static>;

/// Config Entries Manager
pub struct ConfigEntries {
    /// Storage backend
    storage: Arc<Storage>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Setup lock to prevent concurrent setup/unload
    setup_lock: Mutex<()>,

    /// Setup handlers by domain
    setup_handlers: DashMap<String, SetupHandler>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            setup_lock: Mutex::new(()),
            setup_handlers: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.storage.load::<ConfigEntriesData>(STORAGE_KEY).await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> StorageResult<()> {
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };

        let storage_file =
            StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION, STORAGE_MINOR_VERSION);

        self.storage.save(&storage_file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry.clone());
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Check whether a domain already has at least one entry
    ///
    /// Single-instance integrations use this to refuse a second setup.
    pub fn has_entries(&self, domain: &str) -> bool {
        self.by_domain
            .get(domain)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            let duplicate = self
                .get_by_domain(&entry.domain)
                .iter()
                .any(|e| e.unique_id.as_ref() == Some(unique_id));
            if duplicate {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry
    ///
    /// The data field is replaced wholesale, never merged.
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);

        let mut updated = entry;
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            updated.data = data;
        }
        if let Some(unique_id) = update.unique_id {
            updated.unique_id = unique_id;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    /// Set entry state
    pub fn set_state(&self, entry_id: &str, state: ConfigEntryState, reason: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.state = state;
            entry.reason = reason;
            debug!("Entry {} state changed to {:?}", entry_id, state);
        }
    }

    /// Register a setup handler for a domain
    pub fn register_setup_handler(&self, domain: &str, handler: SetupHandler) {
        self.setup_handlers.insert(domain.to_string(), handler);
        debug!("Registered setup handler for domain: {}", domain);
    }

    /// Setup an entry (calls the domain's setup handler)
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.set_state(entry_id, ConfigEntryState::SetupInProgress, None);

        let handler = self
            .setup_handlers
            .get(&entry.domain)
            .map(|h| h.value().clone());

        if let Some(handler) = handler {
            match handler(entry.clone()).await {
                Ok(()) => {
                    self.set_state(entry_id, ConfigEntryState::Loaded, None);
                    info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                }
                Err(reason) => {
                    warn!("Setup failed for entry {}: {}", entry_id, reason);
                    self.set_state(entry_id, ConfigEntryState::SetupError, Some(reason.clone()));
                    return Err(ConfigEntriesError::SetupFailed(reason));
                }
            }
        } else {
            self.set_state(entry_id, ConfigEntryState::Loaded, None);
            debug!(
                "No setup handler for domain {}, marking as loaded",
                entry.domain
            );
        }

        Ok(())
    }

    /// Unload an entry
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }

        self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None);
        self.set_state(entry_id, ConfigEntryState::NotLoaded, None);

        info!("Unloaded entry: {} ({})", entry.title, entry_id);
        Ok(())
    }

    /// Reload an entry (unload + setup)
    ///
    /// The options flow calls this after replacing the exclusion list so
    /// the entity platforms are rebuilt against the new configuration.
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = ConfigEntry> + '_ {
        self.entries.iter().map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));
        let manager = ConfigEntries::new(storage);
        (temp_dir, manager)
    }

    #[tokio::test]
    async fn test_add_and_has_entries() {
        let (_dir, manager) = create_test_manager();

        assert!(!manager.has_entries("area_lights"));

        manager
            .add(ConfigEntry::new("area_lights", "Area Lights"))
            .await
            .unwrap();

        assert!(manager.has_entries("area_lights"));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry1 = ConfigEntry::new("area_lights", "First").with_unique_id("area_lights");
        let entry2 = ConfigEntry::new("area_lights", "Second").with_unique_id("area_lights");

        manager.add(entry1).await.unwrap();
        let result = manager.add(entry2).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_data_wholesale() {
        let (_dir, manager) = create_test_manager();

        let mut data = HashMap::new();
        data.insert("excluded_entities".to_string(), json!(["light.a"]));
        let entry = manager
            .add(ConfigEntry::new("area_lights", "Area Lights").with_data(data))
            .await
            .unwrap();

        let mut new_data = HashMap::new();
        new_data.insert("excluded_entities".to_string(), json!(["light.b", "light.c"]));
        let updated = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().data(new_data))
            .await
            .unwrap();

        let excluded: Vec<String> = updated.get("excluded_entities").unwrap();
        assert_eq!(excluded, vec!["light.b", "light.c"]);
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let (_dir, manager) = create_test_manager();

        let entry = manager
            .add(ConfigEntry::new("area_lights", "Area Lights"))
            .await
            .unwrap();

        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        manager.unload(&entry.entry_id).await.unwrap();
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_reload_reruns_setup_handler() {
        let (_dir, manager) = create_test_manager();

        let setups = Arc::new(AtomicUsize::new(0));
        let setups_clone = setups.clone();
        manager.register_setup_handler(
            "area_lights",
            Arc::new(move |_entry| {
                let setups = setups_clone.clone();
                Box::pin(async move {
                    setups.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        );

        let entry = manager
            .add(ConfigEntry::new("area_lights", "Area Lights"))
            .await
            .unwrap();

        manager.setup(&entry.entry_id).await.unwrap();
        manager.reload(&entry.entry_id).await.unwrap();

        assert_eq!(setups.load(Ordering::SeqCst), 2);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_setup_handler_failure() {
        let (_dir, manager) = create_test_manager();

        manager.register_setup_handler(
            "area_lights",
            Arc::new(|_entry| Box::pin(async { Err("registry unavailable".to_string()) })),
        );

        let entry = manager
            .add(ConfigEntry::new("area_lights", "Area Lights"))
            .await
            .unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(temp_dir.path()));

        {
            let manager = ConfigEntries::new(storage.clone());
            let mut data = HashMap::new();
            data.insert("excluded_entities".to_string(), json!(["light.garage_shelf"]));
            manager
                .add(
                    ConfigEntry::new("area_lights", "Area Lights")
                        .with_data(data)
                        .with_unique_id("area_lights"),
                )
                .await
                .unwrap();
        }

        let manager = ConfigEntries::new(storage);
        manager.load().await.unwrap();

        assert_eq!(manager.len(), 1);
        let entry = manager.get_by_domain("area_lights").pop().unwrap();
        let excluded: Vec<String> = entry.get("excluded_entities").unwrap();
        assert_eq!(excluded, vec!["light.garage_shelf"]);
    }
}
