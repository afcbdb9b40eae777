//! Outbound action boundary
//!
//! The engine only decides which action to run and with what argument. The
//! sink is whatever actually performs it.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{ActionEvent, MediaKey, RingerMode, ZenMode};

/// Capability the dispatch engine calls to execute resolved actions
pub trait ActionSink: Send {
    fn set_do_not_disturb_level(&mut self, level: ZenMode);
    fn set_ringer_mode(&mut self, mode: RingerMode);
    fn dispatch_media_key(&mut self, key: MediaKey);
    fn launch_camera(&mut self);
    fn wake_device(&mut self);
    fn vibrate(&mut self, duration: Duration);
    fn run_configured_action(&mut self, action_id: &str);
}

/// Sink that logs each action and publishes it to subscribers
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    event_tx: broadcast::Sender<ActionEvent>,
}

impl BroadcastSink {
    pub fn new(event_tx: broadcast::Sender<ActionEvent>) -> Self {
        Self { event_tx }
    }

    /// Receive every action published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.event_tx.subscribe()
    }

    fn publish(&self, event: ActionEvent) {
        info!(action = %event, "action dispatched");
        if self.event_tx.send(event).is_err() {
            debug!("no action subscribers");
        }
    }
}

impl ActionSink for BroadcastSink {
    fn set_do_not_disturb_level(&mut self, level: ZenMode) {
        self.publish(ActionEvent::SetDoNotDisturb { level });
    }

    fn set_ringer_mode(&mut self, mode: RingerMode) {
        self.publish(ActionEvent::SetRingerMode { mode });
    }

    fn dispatch_media_key(&mut self, key: MediaKey) {
        self.publish(ActionEvent::DispatchMediaKey {
            key,
            keycode: key.keycode(),
        });
    }

    fn launch_camera(&mut self) {
        self.publish(ActionEvent::LaunchCamera);
    }

    fn wake_device(&mut self) {
        self.publish(ActionEvent::WakeDevice);
    }

    fn vibrate(&mut self, duration: Duration) {
        self.publish(ActionEvent::Vibrate {
            duration_ms: duration.as_millis() as u64,
        });
    }

    fn run_configured_action(&mut self, action_id: &str) {
        self.publish(ActionEvent::RunConfiguredAction {
            action_id: action_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_sink_publishes() {
        let (tx, mut rx) = broadcast::channel(8);
        let mut sink = BroadcastSink::new(tx);

        sink.dispatch_media_key(MediaKey::PlayPause);
        sink.vibrate(Duration::from_millis(50));

        assert_eq!(
            rx.try_recv().unwrap(),
            ActionEvent::DispatchMediaKey {
                key: MediaKey::PlayPause,
                keycode: 85
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ActionEvent::Vibrate { duration_ms: 50 });
    }

    #[test]
    fn test_broadcast_sink_without_subscribers() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let mut sink = BroadcastSink::new(tx);
        sink.launch_camera();
    }
}
