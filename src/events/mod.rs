//! Events module for dispatched system actions
//!
//! Every call the engine makes on the action sink is described by an
//! [`ActionEvent`], which is what subscribed IPC clients receive.

mod sink;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use sink::{ActionSink, BroadcastSink};

/// Notification interruption level (zen mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZenMode {
    Off,
    ImportantInterruptions,
    NoInterruptions,
    Alarms,
}

/// Audio ringer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingerMode {
    Silent,
    Vibrate,
    Normal,
}

/// Media keys a gesture may dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKey {
    PlayPause,
    Next,
    Previous,
}

impl MediaKey {
    /// Platform keycode for this media key
    pub fn keycode(self) -> u16 {
        match self {
            MediaKey::PlayPause => 85,
            MediaKey::Next => 87,
            MediaKey::Previous => 88,
        }
    }
}

/// Actions performed on behalf of a delivered gesture or slider change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionEvent {
    /// Change the notification interruption level
    SetDoNotDisturb { level: ZenMode },

    /// Change the ringer mode
    SetRingerMode { mode: RingerMode },

    /// Dispatch a media key press
    DispatchMediaKey { key: MediaKey, keycode: u16 },

    /// Launch the camera
    LaunchCamera,

    /// Wake the device
    WakeDevice,

    /// Haptic pulse
    Vibrate { duration_ms: u64 },

    /// Run a configured action (builtin id or app target)
    RunConfiguredAction { action_id: String },
}

impl fmt::Display for ActionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionEvent::SetDoNotDisturb { level } => write!(f, "SET_DND ({level:?})"),
            ActionEvent::SetRingerMode { mode } => write!(f, "SET_RINGER ({mode:?})"),
            ActionEvent::DispatchMediaKey { key, keycode } => {
                write!(f, "MEDIA_KEY ({key:?}/{keycode})")
            }
            ActionEvent::LaunchCamera => write!(f, "LAUNCH_CAMERA"),
            ActionEvent::WakeDevice => write!(f, "WAKE_DEVICE"),
            ActionEvent::Vibrate { duration_ms } => write!(f, "VIBRATE ({duration_ms}ms)"),
            ActionEvent::RunConfiguredAction { action_id } => {
                write!(f, "RUN_ACTION ({action_id})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ActionEvent::SetDoNotDisturb {
            level: ZenMode::ImportantInterruptions,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("set_do_not_disturb"));
        assert!(json.contains("important_interruptions"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"vibrate","duration_ms":50}"#;
        let event: ActionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, ActionEvent::Vibrate { duration_ms: 50 });
    }

    #[test]
    fn test_media_keycodes() {
        assert_eq!(MediaKey::PlayPause.keycode(), 85);
        assert_eq!(MediaKey::Previous.keycode(), 88);
        assert_eq!(
            ActionEvent::DispatchMediaKey {
                key: MediaKey::Next,
                keycode: 87
            }
            .to_string(),
            "MEDIA_KEY (Next/87)"
        );
    }
}
