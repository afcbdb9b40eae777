//! Settings module
//!
//! A JSON-backed key/value store plus the atomically swapped snapshot the
//! dispatch engine reads on every event.

mod cache;
mod store;

pub use cache::{SettingsCache, SettingsSnapshot};
pub use store::{JsonFileStore, SettingValue, SettingsError, SettingsStore};

#[cfg(test)]
pub(crate) use store::tests::MemoryStore;
