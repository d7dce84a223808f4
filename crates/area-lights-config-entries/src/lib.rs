//! Configuration entry management
//!
//! A config entry is one persisted instance of an integration's
//! configuration. For the area lights integration that is a single record
//! whose data holds the `excluded_entities` list.

mod entry;
mod manager;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, SetupFuture,
    SetupHandler, STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
