//! Resolved actions and how they map onto the action sink
//!
//! Gesture actions are free-form strings: builtins are wrapped in `**`,
//! anything else names an app target. Slider actions are stored as integers
//! in one of two encodings depending on the device profile.

use serde::{Deserialize, Serialize};

use crate::events::{ActionSink, MediaKey, RingerMode, ZenMode};
use crate::input::GestureCode;

/// Builtin action identifiers
pub mod action_ids {
    pub const NULL: &str = "**null**";
    pub const CAMERA: &str = "**camera**";
    pub const MEDIA_PLAY_PAUSE: &str = "**media_play_pause**";
    pub const MEDIA_PREVIOUS: &str = "**media_previous**";
    pub const MEDIA_NEXT: &str = "**media_next**";
    pub const WAKE_DEVICE: &str = "**wake_device**";
    pub const VIB_SILENT: &str = "**ring_vib_silent**";
    pub const TORCH: &str = "**torch**";
}

/// Action a gesture resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum GestureAction {
    Null,
    Camera,
    Media(MediaKey),
    WakeDevice,
    /// Any other `**...**` builtin, run by id
    Builtin(String),
    /// App or shortcut target
    App(String),
}

impl GestureAction {
    pub fn parse(raw: &str) -> Self {
        match raw {
            action_ids::NULL | "" => Self::Null,
            action_ids::CAMERA => Self::Camera,
            action_ids::MEDIA_PLAY_PAUSE => Self::Media(MediaKey::PlayPause),
            action_ids::MEDIA_PREVIOUS => Self::Media(MediaKey::Previous),
            action_ids::MEDIA_NEXT => Self::Media(MediaKey::Next),
            action_ids::WAKE_DEVICE => Self::WakeDevice,
            other if other.starts_with("**") => Self::Builtin(other.to_string()),
            other => Self::App(other.to_string()),
        }
    }

    /// Run the action on the sink. Returns false when nothing was executed.
    pub fn execute(&self, sink: &mut dyn ActionSink, wake_before: bool) -> bool {
        if wake_before && matches!(self, Self::Camera | Self::App(_)) {
            sink.wake_device();
        }

        match self {
            Self::Null => return false,
            Self::Camera => sink.launch_camera(),
            Self::Media(key) => sink.dispatch_media_key(*key),
            Self::WakeDevice => sink.wake_device(),
            Self::Builtin(id) | Self::App(id) => sink.run_configured_action(id),
        }
        true
    }
}

/// Notification mode the slider can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderAction {
    TotalSilence,
    AlarmsOnly,
    PriorityOnly,
    None,
    Vibrate,
    Ring,
    Silent,
}

impl SliderAction {
    /// Decode the 0-based action index used by settings panels
    pub fn from_index(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::TotalSilence),
            1 => Some(Self::AlarmsOnly),
            2 => Some(Self::PriorityOnly),
            3 => Some(Self::None),
            4 => Some(Self::Vibrate),
            5 => Some(Self::Ring),
            _ => None,
        }
    }

    /// Decode a mode scancode (600-605, 620 for silent)
    pub fn from_mode_scancode(raw: i32) -> Option<Self> {
        match raw {
            600 => Some(Self::TotalSilence),
            601 => Some(Self::AlarmsOnly),
            602 => Some(Self::PriorityOnly),
            603 => Some(Self::None),
            604 => Some(Self::Vibrate),
            605 => Some(Self::Ring),
            620 => Some(Self::Silent),
            _ => None,
        }
    }

    /// Apply the mode through the sink
    ///
    /// With `restore_ringer`, priority-only and none also put the ringer back
    /// to normal so a previous vibrate/silent mode does not linger.
    pub fn apply(self, sink: &mut dyn ActionSink, restore_ringer: bool) {
        match self {
            Self::TotalSilence => sink.set_do_not_disturb_level(ZenMode::NoInterruptions),
            Self::AlarmsOnly => sink.set_do_not_disturb_level(ZenMode::Alarms),
            Self::PriorityOnly => {
                if restore_ringer {
                    sink.set_ringer_mode(RingerMode::Normal);
                }
                sink.set_do_not_disturb_level(ZenMode::ImportantInterruptions);
            }
            Self::None => {
                sink.set_do_not_disturb_level(ZenMode::Off);
                if restore_ringer {
                    sink.set_ringer_mode(RingerMode::Normal);
                }
            }
            Self::Vibrate => sink.set_ringer_mode(RingerMode::Vibrate),
            Self::Ring => sink.set_ringer_mode(RingerMode::Normal),
            Self::Silent => sink.set_ringer_mode(RingerMode::Silent),
        }
    }
}

/// How slider settings are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderEncoding {
    /// 0-based action index, modes only
    ActionIndex,
    /// Mode scancodes, or a gesture scancode to remap the position to
    ModeScancode,
}

/// What a slider position resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SliderTarget {
    Mode(SliderAction),
    Gesture(GestureCode),
}

impl SliderEncoding {
    pub fn decode(self, raw: i32) -> Option<SliderTarget> {
        match self {
            Self::ActionIndex => SliderAction::from_index(raw).map(SliderTarget::Mode),
            Self::ModeScancode => SliderAction::from_mode_scancode(raw)
                .map(SliderTarget::Mode)
                .or_else(|| {
                    u16::try_from(raw)
                        .ok()
                        .and_then(GestureCode::from_scancode)
                        .map(SliderTarget::Gesture)
                }),
        }
    }
}
