//! Core dispatch state machine
//!
//! Holds at most one pending gesture. Any newly accepted event supersedes
//! it, and a pending gesture is only delivered when the proximity gate
//! resolves its own token as far.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::actions::{GestureAction, SliderAction, SliderTarget};
use super::{Disposition, EngineMessage};
use crate::events::ActionSink;
use crate::input::{Edge, GestureCode, InputEvent, SliderPosition};
use crate::profile::DeviceProfile;
use crate::proximity::{GateToken, ProximityGate, ProximityVerdict};
use crate::settings::{SettingsCache, SettingsSnapshot};

/// Length of the haptic pulse that accompanies a delivered action
pub const HAPTIC_PULSE: Duration = Duration::from_millis(50);

/// A gesture waiting on the proximity gate
#[derive(Debug, Clone)]
struct PendingGesture {
    token: GateToken,
    code: GestureCode,
    action: GestureAction,
    scheduled_at_ms: u64,
}

/// What a recognized scancode resolved to
#[derive(Debug, Clone, Copy)]
enum Resolved {
    Mode(SliderAction),
    Gesture(GestureCode),
}

pub struct DispatchEngine {
    profile: Arc<DeviceProfile>,
    settings: Arc<SettingsCache>,
    gate: ProximityGate,
    sink: Box<dyn ActionSink>,
    vibrator_present: bool,
    pending: Option<PendingGesture>,
    next_token: u64,
}

impl DispatchEngine {
    pub fn new(
        profile: Arc<DeviceProfile>,
        settings: Arc<SettingsCache>,
        gate: ProximityGate,
        sink: Box<dyn ActionSink>,
        vibrator_present: bool,
    ) -> Self {
        Self {
            profile,
            settings,
            gate,
            sink,
            vibrator_present,
            pending: None,
            next_token: 0,
        }
    }

    /// Drain the engine queue until every sender is gone
    pub async fn run(&mut self, mut engine_rx: mpsc::Receiver<EngineMessage>) {
        info!(
            profile = %self.profile.kind,
            proximity = self.gate.is_available(),
            vibrator = self.vibrator_present,
            "dispatch engine started"
        );

        while let Some(message) = engine_rx.recv().await {
            self.process(message);
        }

        info!("dispatch engine stopped");
    }

    pub fn process(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Input { event, reply } => {
                let disposition = self.handle(event);
                if let Some(reply) = reply {
                    let _ = reply.send(disposition);
                }
            }
            EngineMessage::ProximitySample { token, value } => {
                let verdict = self.gate.on_sample(token, value);
                self.resolve(token, verdict);
            }
            EngineMessage::GateTimeout { token } => {
                let verdict = self.gate.on_timeout(token);
                self.resolve(token, verdict);
            }
        }
    }

    /// Classify one input event and dispatch or schedule its action
    pub fn handle(&mut self, event: InputEvent) -> Disposition {
        let snapshot = self.settings.get();

        let Some((resolved, required_edge)) = self.classify(event.scancode, &snapshot) else {
            return Disposition::PassThrough;
        };

        if !snapshot.setup_complete {
            debug!(scancode = event.scancode, "setup incomplete, passing through");
            return Disposition::PassThrough;
        }

        if event.edge != required_edge {
            return Disposition::Consumed;
        }

        // A fast re-trigger (or a bouncing switch contact) replaces whatever
        // was still waiting on the gate.
        self.supersede();

        match resolved {
            Resolved::Mode(action) => self.deliver_mode(action, &snapshot),
            Resolved::Gesture(code) => {
                let action = snapshot
                    .gesture_action(code)
                    .cloned()
                    .unwrap_or(GestureAction::Null);

                if self.should_gate(code, &snapshot) {
                    self.schedule(code, action, event.timestamp_ms);
                } else {
                    self.deliver_gesture(code, &action, &snapshot);
                }
            }
        }

        Disposition::Consumed
    }

    fn classify(&self, scancode: u16, snapshot: &SettingsSnapshot) -> Option<(Resolved, Edge)> {
        if let Some(position) = SliderPosition::from_scancode(scancode) {
            return match snapshot.slider(position)? {
                SliderTarget::Mode(action) => Some((Resolved::Mode(action), Edge::Up)),
                SliderTarget::Gesture(code) => {
                    self.profile.binding(code)?;
                    debug!(%position, ?code, "slider remapped to gesture");
                    Some((Resolved::Gesture(code), Edge::Up))
                }
            };
        }

        let binding = GestureCode::from_scancode(scancode).and_then(|c| self.profile.binding(c))?;
        Some((Resolved::Gesture(binding.code), binding.edge))
    }

    fn should_gate(&self, code: GestureCode, snapshot: &SettingsSnapshot) -> bool {
        self.profile.is_gated(code)
            && self.profile.proximity.supported
            && snapshot.proximity_check_enabled
            && self.gate.is_available()
    }

    fn schedule(&mut self, code: GestureCode, action: GestureAction, scheduled_at_ms: u64) {
        self.next_token += 1;
        let token = GateToken(self.next_token);

        if !self.gate.schedule(token, self.profile.proximity.timeout) {
            let snapshot = self.settings.get();
            self.deliver_gesture(code, &action, &snapshot);
            return;
        }

        debug!(
            %token,
            ?code,
            scheduled_at_ms,
            outstanding = self.gate.outstanding(),
            "gesture pending proximity check"
        );
        self.pending = Some(PendingGesture {
            token,
            code,
            action,
            scheduled_at_ms,
        });
    }

    fn supersede(&mut self) {
        if let Some(stale) = self.pending.take() {
            debug!(token = %stale.token, code = ?stale.code, "pending gesture superseded");
        }
        self.gate.evict_all();
    }

    fn resolve(&mut self, token: GateToken, verdict: Option<ProximityVerdict>) {
        let Some(verdict) = verdict else {
            return;
        };

        let pending = match self.pending.take() {
            Some(pending) if pending.token == token => pending,
            other => {
                self.pending = other;
                debug!(%token, "resolution for a gesture that is no longer pending");
                return;
            }
        };

        match verdict {
            ProximityVerdict::Far => {
                let snapshot = self.settings.get();
                self.deliver_gesture(pending.code, &pending.action, &snapshot);
            }
            ProximityVerdict::Near | ProximityVerdict::TimedOut => {
                debug!(
                    %token,
                    code = ?pending.code,
                    ?verdict,
                    scheduled_at_ms = pending.scheduled_at_ms,
                    "gesture dropped"
                );
            }
        }
    }

    fn deliver_gesture(
        &mut self,
        code: GestureCode,
        action: &GestureAction,
        snapshot: &SettingsSnapshot,
    ) {
        info!(?code, ?action, "delivering gesture");
        if action.execute(self.sink.as_mut(), self.profile.wake_before_actions) {
            self.haptic_feedback(snapshot);
        }
    }

    fn deliver_mode(&mut self, action: SliderAction, snapshot: &SettingsSnapshot) {
        info!(?action, "applying slider mode");
        action.apply(self.sink.as_mut(), self.profile.slider_restores_ringer);
        self.haptic_feedback(snapshot);
    }

    fn haptic_feedback(&mut self, snapshot: &SettingsSnapshot) {
        if self.vibrator_present && snapshot.haptic_feedback_enabled {
            self.sink.vibrate(HAPTIC_PULSE);
        }
    }
}
