//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::profile::{DeviceProfile, ProfileKind};

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// JSON file backing the settings store
    pub settings_path: PathBuf,

    pub profile: ProfileKind,

    /// evdev node to read key events from
    pub input_device: Option<PathBuf>,

    /// Raw proximity reading; no sensor when unset
    pub proximity_node: Option<PathBuf>,
    pub proximity_max_range: f32,
    /// Overrides the profile's gate timeout
    pub proximity_timeout: Option<Duration>,
    pub proximity_wake: bool,
    pub proximity_default: bool,

    /// Prefix for sysfs and procfs nodes
    pub sysfs_root: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("keyhandler");

        let socket_path = data_dir.join("daemon.sock");
        let settings_path = data_dir.join("settings.json");

        let profile = match lookup("KEYHANDLER_PROFILE") {
            Some(name) => name
                .parse()
                .context("invalid KEYHANDLER_PROFILE")?,
            None => ProfileKind::TouchGestures,
        };

        let proximity_max_range = match lookup("KEYHANDLER_PROXIMITY_MAX_RANGE") {
            Some(raw) => {
                let range: f32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid KEYHANDLER_PROXIMITY_MAX_RANGE `{raw}`"))?;
                if !range.is_finite() || range <= 0.0 {
                    bail!("KEYHANDLER_PROXIMITY_MAX_RANGE must be positive, got {range}");
                }
                range
            }
            None => 5.0,
        };

        let proximity_timeout = match lookup("KEYHANDLER_PROXIMITY_TIMEOUT_MS") {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid KEYHANDLER_PROXIMITY_TIMEOUT_MS `{raw}`"))?;
                if millis == 0 {
                    bail!("KEYHANDLER_PROXIMITY_TIMEOUT_MS must be positive, got 0");
                }
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        Ok(Self {
            socket_path,
            data_dir,
            settings_path,
            profile,
            input_device: lookup("KEYHANDLER_INPUT_DEVICE").map(PathBuf::from),
            proximity_node: lookup("KEYHANDLER_PROXIMITY_NODE").map(PathBuf::from),
            proximity_max_range,
            proximity_timeout,
            proximity_wake: flag(&lookup, "KEYHANDLER_PROXIMITY_WAKE", true)?,
            proximity_default: flag(&lookup, "KEYHANDLER_PROXIMITY_DEFAULT", true)?,
            sysfs_root: lookup("KEYHANDLER_SYSFS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/")),
        })
    }

    /// Device profile with the proximity overrides applied
    pub fn device_profile(&self) -> DeviceProfile {
        let mut profile = DeviceProfile::for_kind(self.profile);
        if let Some(timeout) = self.proximity_timeout {
            profile.proximity.timeout = timeout;
        }
        profile.proximity.supported = self.proximity_wake;
        profile.proximity.default_enabled = self.proximity_default;
        profile
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid {key} `{raw}`, expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::{assert_err, assert_ok};

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = assert_ok!(config_from(&[("HOME", "/home/user")]));
        assert_eq!(
            config.socket_path,
            PathBuf::from("/home/user/.local/share/keyhandler/daemon.sock")
        );
        assert_eq!(config.profile, ProfileKind::TouchGestures);
        assert_eq!(config.proximity_max_range, 5.0);
        assert!(config.proximity_timeout.is_none());
        assert!(config.proximity_wake);
        assert!(config.input_device.is_none());
        assert_eq!(config.sysfs_root, PathBuf::from("/"));
    }

    #[test]
    fn test_config_overrides() {
        let config = assert_ok!(config_from(&[
            ("HOME", "/home/user"),
            ("KEYHANDLER_PROFILE", "flip-camera"),
            ("KEYHANDLER_INPUT_DEVICE", "/dev/input/event3"),
            ("KEYHANDLER_PROXIMITY_TIMEOUT_MS", "400"),
            ("KEYHANDLER_PROXIMITY_DEFAULT", "off"),
        ]));
        assert_eq!(config.profile, ProfileKind::FlipCamera);
        assert_eq!(config.input_device, Some(PathBuf::from("/dev/input/event3")));

        let profile = config.device_profile();
        assert_eq!(profile.proximity.timeout, Duration::from_millis(400));
        assert!(!profile.proximity.default_enabled);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert_err!(config_from(&[]));
        assert_err!(config_from(&[
            ("HOME", "/h"),
            ("KEYHANDLER_PROXIMITY_TIMEOUT_MS", "soon")
        ]));
        assert_err!(config_from(&[
            ("HOME", "/h"),
            ("KEYHANDLER_PROXIMITY_MAX_RANGE", "-1")
        ]));
        assert_err!(config_from(&[
            ("HOME", "/h"),
            ("KEYHANDLER_PROXIMITY_TIMEOUT_MS", "0")
        ]));
        assert_err!(config_from(&[("HOME", "/h"), ("KEYHANDLER_PROFILE", "pixel")]));
        assert_err!(config_from(&[("HOME", "/h"), ("KEYHANDLER_PROXIMITY_WAKE", "maybe")]));
    }
}
