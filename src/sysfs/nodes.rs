//! Kernel gesture toggles and vibrator strength
//!
//! The touch panel driver only exposes one global switch per gesture group,
//! so enabling gestures writes every group node that exists.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{is_writable, read_one_line, write_line, SysfsError};
use crate::settings::{SettingValue, SettingsStore};

const GESTURE_DOUBLE_TAP: &str = "proc/touchpanel/double_tap_enable";
const GESTURE_CAMERA: &str = "proc/touchpanel/camera_enable";
const GESTURE_FLASHLIGHT: &str = "proc/touchpanel/flashlight_enable";
const GESTURE_MUSIC: &str = "proc/touchpanel/music_enable";
const GESTURE_SILENT_VIB_SOUND: &str = "proc/touchpanel/silent_vib_sound_enable";

const GESTURE_CONTROL_NODES: [&str; 5] = [
    GESTURE_DOUBLE_TAP,
    GESTURE_CAMERA,
    GESTURE_FLASHLIGHT,
    GESTURE_MUSIC,
    GESTURE_SILENT_VIB_SOUND,
];

const VIBRATOR_CLASS: &str = "sys/class/timed_output/vibrator";
const VIBRATOR_LEVEL: &str = "sys/devices/virtual/timed_output/vibrator/vtg_level";

/// Whether the device has a vibrator at all
pub fn vibrator_present(root: &Path) -> bool {
    root.join(VIBRATOR_CLASS).exists()
}

/// Touch panel gesture switches under `/proc/touchpanel`
#[derive(Debug, Clone)]
pub struct KernelControl {
    root: PathBuf,
}

impl KernelControl {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Enable or disable every gesture group the kernel exposes
    ///
    /// Returns how many nodes were written.
    pub fn enable_gestures(&self, enable: bool) -> Result<usize, SysfsError> {
        let value = if enable { "1" } else { "0" };
        let mut written = 0;

        for node in GESTURE_CONTROL_NODES {
            let path = self.root.join(node);
            if path.exists() {
                write_line(&path, value)?;
                written += 1;
            }
        }

        info!(enable, written, "kernel gesture control updated");
        Ok(written)
    }

    /// The upward-V gesture is only reported when this node exists
    pub fn is_arrow_up_supported(&self) -> bool {
        self.root.join(GESTURE_SILENT_VIB_SOUND).exists()
    }

    pub fn has_touchscreen_gestures(&self) -> bool {
        [GESTURE_DOUBLE_TAP, GESTURE_CAMERA, GESTURE_FLASHLIGHT, GESTURE_MUSIC]
            .iter()
            .all(|node| self.root.join(node).exists())
    }
}

/// Vibration strength node of the haptics driver
#[derive(Debug, Clone)]
pub struct VibratorStrength {
    node: PathBuf,
}

impl VibratorStrength {
    /// Driver limits, from drivers/platform/msm/qpnp-haptic.c
    pub const MIN: u32 = 116;
    pub const MAX: u32 = 2088;
    pub const DEFAULT: u32 = 2088;

    /// Settings key the chosen strength is persisted under
    pub const SETTINGS_KEY: &'static str = "vibrator_strength";

    pub fn new(root: &Path) -> Self {
        Self {
            node: root.join(VIBRATOR_LEVEL),
        }
    }

    pub fn is_supported(&self) -> bool {
        is_writable(&self.node)
    }

    pub fn get(&self) -> Result<u32, SysfsError> {
        let raw = read_one_line(&self.node)?;
        raw.trim().parse().map_err(|_| SysfsError::Parse {
            path: self.node.clone(),
            value: raw,
        })
    }

    /// Write a new strength, clamped to the driver range, and persist it
    pub fn set(&self, level: u32, store: &dyn SettingsStore) -> Result<u32, SysfsError> {
        if !self.is_supported() {
            return Err(SysfsError::Unsupported(self.node.clone()));
        }

        let level = level.clamp(Self::MIN, Self::MAX);
        write_line(&self.node, &level.to_string())?;
        store.put(Self::SETTINGS_KEY, SettingValue::Text(level.to_string()))?;
        debug!(level, "vibrator strength set");
        Ok(level)
    }

    /// Re-apply the persisted strength at startup
    pub fn restore(&self, store: &dyn SettingsStore) -> Result<Option<u32>, SysfsError> {
        if !self.is_supported() {
            return Ok(None);
        }

        let level = match store.get_string(Self::SETTINGS_KEY) {
            Some(stored) => stored.trim().parse().unwrap_or_else(|_| {
                warn!(stored, "bad stored vibrator strength, using default");
                Self::DEFAULT
            }),
            None => Self::DEFAULT,
        };
        let level = level.clamp(Self::MIN, Self::MAX);

        write_line(&self.node, &level.to_string())?;
        info!(level, "vibrator strength restored");
        Ok(Some(level))
    }
}
