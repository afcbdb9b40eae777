//! Dispatch engine module
//!
//! Classifies incoming scancodes, remaps slider positions through settings,
//! and delivers the resulting actions either immediately or after a
//! proximity check. All inputs, sensor samples and timeouts are processed
//! one at a time from a single queue.

pub mod actions;
mod dispatch;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::input::InputEvent;
use crate::proximity::GateToken;

pub use dispatch::DispatchEngine;

/// What the caller should do with an input event after dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Handled here; suppress further propagation
    Consumed,
    /// Not ours; let normal processing continue
    PassThrough,
}

/// Messages drained by the engine task
#[derive(Debug)]
pub enum EngineMessage {
    /// A key transition, with an optional channel for the disposition
    Input {
        event: InputEvent,
        reply: Option<oneshot::Sender<Disposition>>,
    },
    /// A proximity sample requested for `token`
    ProximitySample { token: GateToken, value: f32 },
    /// The proximity timeout for `token` fired
    GateTimeout { token: GateToken },
}
