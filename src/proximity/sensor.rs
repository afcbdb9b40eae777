//! Runtime implementations of the gate's sensor and timer
//!
//! Both post their completions into the engine queue so they are handled in
//! order with input events.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::gate::{GateToken, ProximitySensor, TimeoutScheduler};
use crate::engine::EngineMessage;
use crate::sysfs::{read_one_line, SysfsError};

/// Proximity sensor exposed as an IIO raw value file
///
/// Every request performs a single read of the node.
pub struct IioProximitySensor {
    node: PathBuf,
    max_range: f32,
    engine_tx: mpsc::Sender<EngineMessage>,
    reads: HashMap<GateToken, JoinHandle<()>>,
}

impl IioProximitySensor {
    pub fn new(
        node: impl Into<PathBuf>,
        max_range: f32,
        engine_tx: mpsc::Sender<EngineMessage>,
    ) -> Self {
        Self {
            node: node.into(),
            max_range,
            engine_tx,
            reads: HashMap::new(),
        }
    }

    /// Build a sensor only if its node yields a reading right now
    ///
    /// A node that is missing or not numeric means there is no sensor, so
    /// gating stays off instead of timing out every gesture.
    pub fn open(
        node: impl Into<PathBuf>,
        max_range: f32,
        engine_tx: mpsc::Sender<EngineMessage>,
    ) -> Result<Self, SysfsError> {
        let node = node.into();
        let raw = read_one_line(&node)?;
        let value: f32 = raw.trim().parse().map_err(|_| SysfsError::Parse {
            path: node.clone(),
            value: raw.clone(),
        })?;
        debug!(?node, value, "proximity sensor opened");
        Ok(Self::new(node, max_range, engine_tx))
    }
}

impl ProximitySensor for IioProximitySensor {
    fn max_range(&self) -> f32 {
        self.max_range
    }

    fn request_sample(&mut self, token: GateToken) {
        self.reads.retain(|_, read| !read.is_finished());

        let node = self.node.clone();
        let engine_tx = self.engine_tx.clone();
        let read = tokio::spawn(async move {
            let raw = match tokio::fs::read_to_string(&node).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(?e, ?node, "failed to read proximity sensor");
                    return;
                }
            };
            let value = match raw.trim().parse::<f32>() {
                Ok(value) => value,
                Err(e) => {
                    warn!(?e, raw = raw.trim(), "unparseable proximity sample");
                    return;
                }
            };
            let _ = engine_tx
                .send(EngineMessage::ProximitySample { token, value })
                .await;
        });
        self.reads.insert(token, read);
    }

    fn cancel(&mut self, token: GateToken) {
        if let Some(read) = self.reads.remove(&token) {
            read.abort();
        }
    }
}

/// Gate timeouts backed by tokio timers
pub struct TokioTimeouts {
    engine_tx: mpsc::Sender<EngineMessage>,
    timers: HashMap<GateToken, JoinHandle<()>>,
}

impl TokioTimeouts {
    pub fn new(engine_tx: mpsc::Sender<EngineMessage>) -> Self {
        Self {
            engine_tx,
            timers: HashMap::new(),
        }
    }
}

impl TimeoutScheduler for TokioTimeouts {
    fn arm(&mut self, token: GateToken, after: Duration) {
        self.timers.retain(|_, timer| !timer.is_finished());

        let engine_tx = self.engine_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = engine_tx.send(EngineMessage::GateTimeout { token }).await;
        });
        if let Some(previous) = self.timers.insert(token, timer) {
            previous.abort();
        }
    }

    fn disarm(&mut self, token: GateToken) {
        if let Some(timer) = self.timers.remove(&token) {
            debug!(%token, "gate timer disarmed");
            timer.abort();
        }
    }
}
