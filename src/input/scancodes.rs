//! Scancode definitions and input event records
//!
//! Scancodes are the raw `EV_KEY` codes the touch panel and tri-state key
//! drivers report. Slider positions are kept apart from gestures because they
//! are remapped through settings before classification.

use serde::{Deserialize, Serialize};

/// Raw scancode values reported by the kernel drivers
pub mod codes {
    /// Flip-to-wake camera gesture
    pub const FLIP_CAMERA: u16 = 249;
    /// Circle drawn on the screen-off panel
    pub const GESTURE_CIRCLE: u16 = 250;
    /// Two-finger swipe down
    pub const GESTURE_SWIPE_DOWN: u16 = 251;
    /// "V" drawn downwards
    pub const GESTURE_V: u16 = 252;
    /// "<" chevron (left to right)
    pub const GESTURE_LTR: u16 = 253;
    /// ">" chevron (right to left)
    pub const GESTURE_GTR: u16 = 254;
    /// "V" drawn upwards
    pub const GESTURE_V_UP: u16 = 255;

    /// Tri-state key positions, from drivers/input/misc/tri_state_key.c
    pub const SLIDER_TOP: u16 = 601;
    pub const SLIDER_MIDDLE: u16 = 602;
    pub const SLIDER_BOTTOM: u16 = 603;
}

/// Key transition carried by an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Down,
    Up,
}

impl Edge {
    /// Map an evdev key value to an edge. Autorepeat (2) has no edge.
    pub fn from_evdev_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Edge::Up),
            1 => Some(Edge::Down),
            _ => None,
        }
    }
}

/// One key transition from the input subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub scancode: u16,
    pub edge: Edge,
    /// Event time in milliseconds, as reported by the producer
    pub timestamp_ms: u64,
}

impl InputEvent {
    pub fn new(scancode: u16, edge: Edge, timestamp_ms: u64) -> Self {
        Self {
            scancode,
            edge,
            timestamp_ms,
        }
    }
}

/// Recognized gesture scancodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureCode {
    FlipCamera,
    Circle,
    SwipeDown,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
}

impl GestureCode {
    pub fn from_scancode(scancode: u16) -> Option<Self> {
        match scancode {
            codes::FLIP_CAMERA => Some(Self::FlipCamera),
            codes::GESTURE_CIRCLE => Some(Self::Circle),
            codes::GESTURE_SWIPE_DOWN => Some(Self::SwipeDown),
            codes::GESTURE_V => Some(Self::ArrowDown),
            codes::GESTURE_LTR => Some(Self::ArrowLeft),
            codes::GESTURE_GTR => Some(Self::ArrowRight),
            codes::GESTURE_V_UP => Some(Self::ArrowUp),
            _ => None,
        }
    }

    pub fn scancode(self) -> u16 {
        match self {
            Self::FlipCamera => codes::FLIP_CAMERA,
            Self::Circle => codes::GESTURE_CIRCLE,
            Self::SwipeDown => codes::GESTURE_SWIPE_DOWN,
            Self::ArrowDown => codes::GESTURE_V,
            Self::ArrowLeft => codes::GESTURE_LTR,
            Self::ArrowRight => codes::GESTURE_GTR,
            Self::ArrowUp => codes::GESTURE_V_UP,
        }
    }
}

/// Tri-state slider positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SliderPosition {
    Top,
    Middle,
    Bottom,
}

impl SliderPosition {
    pub fn from_scancode(scancode: u16) -> Option<Self> {
        match scancode {
            codes::SLIDER_TOP => Some(Self::Top),
            codes::SLIDER_MIDDLE => Some(Self::Middle),
            codes::SLIDER_BOTTOM => Some(Self::Bottom),
            _ => None,
        }
    }

    /// Index into per-position tables (top, middle, bottom)
    pub fn index(self) -> usize {
        match self {
            Self::Top => 0,
            Self::Middle => 1,
            Self::Bottom => 2,
        }
    }
}

impl std::fmt::Display for SliderPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SliderPosition::Top => write!(f, "top"),
            SliderPosition::Middle => write!(f, "middle"),
            SliderPosition::Bottom => write!(f, "bottom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_scancodes_are_symmetric() {
        for code in 249..=255u16 {
            let gesture = GestureCode::from_scancode(code).unwrap();
            assert_eq!(gesture.scancode(), code);
        }
        assert_eq!(GestureCode::from_scancode(248), None);
        assert_eq!(GestureCode::from_scancode(codes::SLIDER_TOP), None);
    }

    #[test]
    fn test_slider_positions() {
        assert_eq!(SliderPosition::from_scancode(601), Some(SliderPosition::Top));
        assert_eq!(SliderPosition::from_scancode(602), Some(SliderPosition::Middle));
        assert_eq!(SliderPosition::from_scancode(603), Some(SliderPosition::Bottom));
        assert_eq!(SliderPosition::from_scancode(600), None);
        assert_eq!(SliderPosition::Bottom.index(), 2);
    }

    #[test]
    fn test_evdev_values() {
        assert_eq!(Edge::from_evdev_value(0), Some(Edge::Up));
        assert_eq!(Edge::from_evdev_value(1), Some(Edge::Down));
        assert_eq!(Edge::from_evdev_value(2), None);
    }

    #[test]
    fn test_input_event_deserialization() {
        let json = r#"{"scancode":252,"edge":"up","timestamp_ms":10}"#;
        let event: InputEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, InputEvent::new(252, Edge::Up, 10));
    }
}
