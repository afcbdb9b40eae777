//! Persistent key/value settings store
//!
//! Values are kept as a flat JSON object on disk. Integers and strings are
//! both accepted; integer reads also accept numeric strings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A stored setting value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Text(String),
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

/// Errors raised by a settings store
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("setting `{key}` is not an integer: {value:?}")]
    NotInteger { key: String, value: SettingValue },
}

/// Backing store the settings cache reads from
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<SettingValue>;

    fn put(&self, key: &str, value: SettingValue) -> Result<(), SettingsError>;

    /// All stored values, ordered by key
    fn entries(&self) -> BTreeMap<String, SettingValue>;

    /// Re-read the backing storage after an external edit
    fn reload(&self) -> Result<(), SettingsError> {
        Ok(())
    }

    fn get_int(&self, key: &str) -> Result<Option<i32>, SettingsError> {
        let not_integer = |value: SettingValue| SettingsError::NotInteger {
            key: key.to_string(),
            value,
        };

        match self.get(key) {
            None => Ok(None),
            Some(SettingValue::Int(raw)) => i32::try_from(raw)
                .map(Some)
                .map_err(|_| not_integer(SettingValue::Int(raw))),
            Some(SettingValue::Text(text)) => match text.trim().parse() {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => Err(not_integer(SettingValue::Text(text))),
            },
        }
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| match value {
            SettingValue::Int(raw) => raw.to_string(),
            SettingValue::Text(text) => text,
        })
    }
}

/// Settings store persisted as a JSON object
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, SettingValue>>,
}

impl JsonFileStore {
    /// Open the store, starting empty when the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = Self::load(&path)?;
        info!(?path, entries = values.len(), "settings store opened");

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, SettingValue>, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    fn persist(&self, values: &BTreeMap<String, SettingValue>) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_vec_pretty(values).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;

        // Write aside and rename so readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<SettingValue> {
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        self.persist(&values)
    }

    fn entries(&self) -> BTreeMap<String, SettingValue> {
        self.values.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn reload(&self) -> Result<(), SettingsError> {
        let values = Self::load(&self.path)?;
        debug!(entries = values.len(), "settings store reloaded");
        *self.values.write().unwrap_or_else(|e| e.into_inner()) = values;
        Ok(())
    }
}
