//! Device profiles
//!
//! Each supported device generation differs only in its gesture set, edge
//! policy per gesture, proximity gating and settings layout. A profile
//! captures those differences so a single engine serves all of them.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::actions::{action_ids, SliderEncoding};
use crate::input::scancodes::codes;
use crate::input::{Edge, GestureCode};

/// Built-in profile selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Screen-off touch gestures plus slider, settings stored as mode scancodes
    TouchGestures,
    /// Flip-to-wake camera gesture plus slider, settings stored as action indices
    FlipCamera,
}

impl ProfileKind {
    pub fn name(self) -> &'static str {
        match self {
            ProfileKind::TouchGestures => "touch-gestures",
            ProfileKind::FlipCamera => "flip-camera",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown device profile `{0}` (expected touch-gestures or flip-camera)")]
pub struct UnknownProfile(String);

impl FromStr for ProfileKind {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "touch-gestures" => Ok(ProfileKind::TouchGestures),
            "flip-camera" => Ok(ProfileKind::FlipCamera),
            other => Err(UnknownProfile(other.to_string())),
        }
    }
}

/// A recognized gesture and how it is delivered
#[derive(Debug, Clone, Copy)]
pub struct GestureBinding {
    pub code: GestureCode,
    /// Edge that triggers the gesture; the other edge is swallowed
    pub edge: Edge,
    /// Settings key holding a user-chosen action, if configurable
    pub pref_key: Option<&'static str>,
    pub default_action: &'static str,
}

/// Proximity gating rules
#[derive(Debug, Clone)]
pub struct ProximityPolicy {
    /// Resolved scancodes below this value are gated
    pub gate_below: u16,
    pub timeout: Duration,
    /// Whether the device supports the check at all
    pub supported: bool,
    /// Settings key that toggles the check; always on when absent
    pub setting_key: Option<&'static str>,
    pub default_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub kind: ProfileKind,
    pub gestures: &'static [GestureBinding],
    /// Settings keys for top, middle and bottom
    pub slider_keys: [&'static str; 3],
    pub slider_defaults: [i32; 3],
    pub slider_encoding: SliderEncoding,
    /// Priority-only and none also set the ringer back to normal
    pub slider_restores_ringer: bool,
    pub haptic_key: &'static str,
    /// Events pass through until this setting reports setup complete
    pub setup_key: Option<&'static str>,
    /// Wake the device before camera and app actions
    pub wake_before_actions: bool,
    pub proximity: ProximityPolicy,
}

/// Lowest slider mode scancode; everything below it is a gesture
const MODE_SCANCODE_BASE: u16 = 600;

static TOUCH_GESTURES: [GestureBinding; 6] = [
    GestureBinding {
        code: GestureCode::Circle,
        edge: Edge::Up,
        pref_key: Some("gesture_circle"),
        default_action: action_ids::CAMERA,
    },
    GestureBinding {
        code: GestureCode::SwipeDown,
        edge: Edge::Up,
        pref_key: Some("gesture_double_swipe"),
        default_action: action_ids::MEDIA_PLAY_PAUSE,
    },
    GestureBinding {
        code: GestureCode::ArrowDown,
        edge: Edge::Up,
        pref_key: Some("gesture_arrow_down"),
        default_action: action_ids::VIB_SILENT,
    },
    GestureBinding {
        code: GestureCode::ArrowUp,
        edge: Edge::Up,
        pref_key: Some("gesture_arrow_up"),
        default_action: action_ids::TORCH,
    },
    GestureBinding {
        code: GestureCode::ArrowLeft,
        edge: Edge::Up,
        pref_key: Some("gesture_arrow_left"),
        default_action: action_ids::MEDIA_PREVIOUS,
    },
    GestureBinding {
        code: GestureCode::ArrowRight,
        edge: Edge::Up,
        pref_key: Some("gesture_arrow_right"),
        default_action: action_ids::MEDIA_NEXT,
    },
];

// Flip-to-wake fires on press to keep wake latency down.
static FLIP_CAMERA: [GestureBinding; 1] = [GestureBinding {
    code: GestureCode::FlipCamera,
    edge: Edge::Down,
    pref_key: None,
    default_action: action_ids::CAMERA,
}];

impl DeviceProfile {
    pub fn for_kind(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::TouchGestures => Self::touch_gestures(),
            ProfileKind::FlipCamera => Self::flip_camera(),
        }
    }

    pub fn touch_gestures() -> Self {
        Self {
            kind: ProfileKind::TouchGestures,
            gestures: &TOUCH_GESTURES,
            slider_keys: [
                "device_oppo_common_notification_slider_up1",
                "device_oppo_common_notification_slider_middle1",
                "device_oppo_common_notification_slider_bottom1",
            ],
            slider_defaults: [
                i32::from(codes::SLIDER_TOP),
                i32::from(codes::SLIDER_MIDDLE),
                i32::from(codes::SLIDER_BOTTOM),
            ],
            slider_encoding: SliderEncoding::ModeScancode,
            slider_restores_ringer: true,
            haptic_key: "device_oppo_common_notification_slider_haptic_feedback",
            setup_key: None,
            wake_before_actions: true,
            proximity: ProximityPolicy {
                gate_below: MODE_SCANCODE_BASE,
                timeout: Duration::from_millis(200),
                supported: true,
                setting_key: None,
                default_enabled: true,
            },
        }
    }

    pub fn flip_camera() -> Self {
        Self {
            kind: ProfileKind::FlipCamera,
            gestures: &FLIP_CAMERA,
            slider_keys: [
                "device_oppo_common_notification_slider_up",
                "device_oppo_common_notification_slider_middle",
                "device_oppo_common_notification_slider_bottom",
            ],
            slider_defaults: [1, 2, 3],
            slider_encoding: SliderEncoding::ActionIndex,
            slider_restores_ringer: false,
            haptic_key: "touchscreen_gesture_haptic_feedback",
            setup_key: Some("user_setup_complete"),
            wake_before_actions: false,
            proximity: ProximityPolicy {
                gate_below: MODE_SCANCODE_BASE,
                timeout: Duration::from_millis(250),
                supported: true,
                setting_key: Some("proximity_on_wake"),
                default_enabled: true,
            },
        }
    }

    pub fn binding(&self, code: GestureCode) -> Option<&GestureBinding> {
        self.gestures.iter().find(|b| b.code == code)
    }

    /// Code-range check for gestures that may fire while in a pocket
    pub fn is_gated(&self, code: GestureCode) -> bool {
        code.scancode() < self.proximity.gate_below
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_kind_parsing() {
        assert_eq!(
            "flip-camera".parse::<ProfileKind>().unwrap(),
            ProfileKind::FlipCamera
        );
        assert!("oneplus".parse::<ProfileKind>().is_err());
        assert_eq!(ProfileKind::TouchGestures.to_string(), "touch-gestures");
    }

    #[test]
    fn test_flip_camera_fires_on_press() {
        let profile = DeviceProfile::flip_camera();
        let binding = profile.binding(GestureCode::FlipCamera).unwrap();
        assert_eq!(binding.edge, Edge::Down);
        assert!(profile.binding(GestureCode::Circle).is_none());
    }

    #[test]
    fn test_touch_gestures_fire_on_release() {
        let profile = DeviceProfile::touch_gestures();
        assert!(profile.gestures.iter().all(|b| b.edge == Edge::Up));
        assert!(profile.binding(GestureCode::FlipCamera).is_none());
    }

    #[test]
    fn test_gestures_are_gated_by_code_range() {
        let profile = DeviceProfile::touch_gestures();
        assert!(profile.is_gated(GestureCode::Circle));
        assert!(profile.is_gated(GestureCode::ArrowUp));
    }
}
