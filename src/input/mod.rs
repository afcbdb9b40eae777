//! Input module for gesture and slider key events
//!
//! Reads evdev key records from the touch panel and tri-state key device and
//! forwards them to the dispatch engine.

mod listener;
pub mod scancodes;

pub use listener::{InputListener, ListenerError};
pub use scancodes::{Edge, GestureCode, InputEvent, SliderPosition};
