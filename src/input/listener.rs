//! evdev listener for gesture and slider key events
//!
//! Opens the device node with the `evdev` crate and reads its event stream on
//! a tokio task, forwarding key transitions to the dispatch engine queue.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use evdev::{Device, EventType};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::scancodes::{Edge, InputEvent};
use crate::engine::EngineMessage;

/// Listener that feeds evdev key events into the engine queue
pub struct InputListener {
    device: PathBuf,
    engine_tx: mpsc::Sender<EngineMessage>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

/// Errors that can occur in the input listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("input listener is already running")]
    AlreadyRunning,

    #[error("failed to open input device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create event stream for {path}: {source}")]
    Stream {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InputListener {
    pub fn new(device: impl Into<PathBuf>, engine_tx: mpsc::Sender<EngineMessage>) -> Self {
        Self {
            device: device.into(),
            engine_tx,
            reader: Mutex::new(None),
        }
    }

    /// Open the device and start reading its event stream
    ///
    /// The device is opened before the reader task is spawned so a missing
    /// node or a permission problem is reported to the caller. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        if reader.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(ListenerError::AlreadyRunning);
        }

        let device = Device::open(&self.device).map_err(|source| ListenerError::DeviceOpen {
            path: self.device.clone(),
            source,
        })?;
        info!(
            path = ?self.device,
            name = device.name().unwrap_or("unknown"),
            "input device opened"
        );

        let stream = device
            .into_event_stream()
            .map_err(|source| ListenerError::Stream {
                path: self.device.clone(),
                source,
            })?;

        let engine_tx = self.engine_tx.clone();
        let path = self.device.clone();
        *reader = Some(tokio::spawn(async move {
            read_events(stream, &path, engine_tx).await;
            info!(?path, "input listener stopped");
        }));

        Ok(())
    }

    /// Stop reading; takes effect immediately
    pub fn stop(&self) {
        if let Some(task) = self.reader.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
            debug!(device = ?self.device, "input listener aborted");
        }
    }

    pub fn is_running(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

async fn read_events(
    mut stream: evdev::EventStream,
    device: &Path,
    engine_tx: mpsc::Sender<EngineMessage>,
) {
    loop {
        let raw = match stream.next_event().await {
            Ok(raw) => raw,
            Err(e) => {
                error!(?e, ?device, "failed to read input event");
                break;
            }
        };

        let Some(event) = parse_key_event(&raw) else {
            continue;
        };

        debug!(scancode = event.scancode, edge = ?event.edge, "key event");

        let message = EngineMessage::Input { event, reply: None };
        if engine_tx.send(message).await.is_err() {
            warn!("failed to forward input event - engine queue closed?");
            break;
        }
    }
}

/// Convert an evdev event, keeping only key press and release
pub fn parse_key_event(raw: &evdev::InputEvent) -> Option<InputEvent> {
    if raw.event_type() != EventType::KEY {
        return None;
    }

    let edge = Edge::from_evdev_value(raw.value())?;
    let timestamp_ms = raw
        .timestamp()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default();

    Some(InputEvent::new(raw.code(), edge, timestamp_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_release() {
        let raw = evdev::InputEvent::new(EventType::KEY, 252, 0);
        let event = parse_key_event(&raw).unwrap();
        assert_eq!(event.scancode, 252);
        assert_eq!(event.edge, Edge::Up);
    }

    #[test]
    fn test_parse_key_press() {
        let raw = evdev::InputEvent::new(EventType::KEY, 249, 1);
        let event = parse_key_event(&raw).unwrap();
        assert_eq!(event.scancode, 249);
        assert_eq!(event.edge, Edge::Down);
    }

    #[test]
    fn test_parse_skips_non_key_and_repeat() {
        assert!(parse_key_event(&evdev::InputEvent::new(EventType::SYNCHRONIZATION, 0, 0)).is_none());
        assert!(parse_key_event(&evdev::InputEvent::new(EventType::ABSOLUTE, 252, 1)).is_none());
        assert!(parse_key_event(&evdev::InputEvent::new(EventType::KEY, 601, 2)).is_none());
    }

    #[tokio::test]
    async fn test_start_missing_device() {
        let (tx, _rx) = mpsc::channel(4);
        let listener = InputListener::new("/nonexistent/input/event99", tx);
        let err = listener.start().unwrap_err();
        assert!(matches!(err, ListenerError::DeviceOpen { .. }));
        assert!(!listener.is_running());
    }

    #[tokio::test]
    async fn test_non_evdev_node_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let listener = InputListener::new(file.path(), tx);

        assert!(listener.start().is_err());
        assert!(!listener.is_running());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_a_no_op() {
        let (tx, _rx) = mpsc::channel(4);
        let listener = InputListener::new("/dev/input/event0", tx);
        listener.stop();
        assert!(!listener.is_running());
    }
}
