//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::Disposition;
use crate::events::ActionEvent;
use crate::input::Edge;
use crate::settings::{SettingValue, SettingsSnapshot};

/// Largest frame accepted in either direction
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to dispatched action notifications
    Subscribe,

    /// Feed a key transition through the dispatch engine
    InjectKey { scancode: u16, edge: Edge },

    /// Raw stored values plus the resolved snapshot
    GetSettings,

    /// Write one setting and refresh the cache
    PutSetting { key: String, value: SettingValue },

    /// Re-read the settings file after an external edit
    ReloadSettings,

    GetVibratorStrength,

    SetVibratorStrength { level: u32 },

    /// Toggle the kernel touch panel gesture nodes
    SetGesturesEnabled { enabled: bool },
}

/// Responses from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Subscription confirmed
    Subscribed,

    /// Result of an injected key
    KeyHandled {
        consumed: bool,
        disposition: Disposition,
    },

    Settings {
        values: BTreeMap<String, SettingValue>,
        resolved: SettingsSnapshot,
    },

    /// Generic acknowledgement for writes
    Ok,

    VibratorStrength {
        level: u32,
        min: u32,
        max: u32,
    },

    /// How many kernel gesture nodes were written
    GesturesEnabled { enabled: bool, nodes: usize },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An action was dispatched
    Action { action: ActionEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Active device profile
    pub profile: String,

    /// Uptime in seconds
    pub uptime_secs: u64,

    /// Whether the evdev reader thread is running
    pub input_listener: bool,

    /// Whether gestures can be proximity checked
    pub proximity_gate: bool,

    pub vibrator: bool,
    pub vibrator_strength_supported: bool,
    pub touchscreen_gestures: bool,
    pub arrow_up_supported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::InjectKey {
            scancode: 252,
            edge: Edge::Up,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("inject_key"));
        assert!(json.contains("252"));

        let parsed: Request =
            serde_json::from_str(r#"{"type":"put_setting","key":"gesture_circle","value":"**torch**"}"#)
                .unwrap();
        assert!(matches!(
            parsed,
            Request::PutSetting { value: SettingValue::Text(_), .. }
        ));
    }

    #[test]
    fn test_notification_wraps_action() {
        let note = Notification::Action {
            action: ActionEvent::LaunchCamera,
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["type"], "action");
        assert_eq!(json["action"]["type"], "launch_camera");
    }

    #[test]
    fn test_error_response_serialization() {
        let resp = Response::error("bad_request", "unknown field");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("bad_request"));
    }
}
