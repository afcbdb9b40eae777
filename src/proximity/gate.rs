//! One-shot proximity gate
//!
//! Each registration asks the sensor for exactly one sample and arms one
//! timeout. Whichever completes first resolves the registration and cancels
//! the other; anything arriving later for the same token is ignored.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifies one gate registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GateToken(pub u64);

impl fmt::Display for GateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a registration resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityVerdict {
    /// Sample at the sensor's maximum range: nothing covering the sensor
    Far,
    /// Any other sample
    Near,
    /// No sample before the timeout
    TimedOut,
}

/// Binary proximity sensor that can be asked for a single sample
///
/// Implementations report the sample back asynchronously, tagged with the
/// token it was requested for.
pub trait ProximitySensor: Send {
    fn max_range(&self) -> f32;
    fn request_sample(&mut self, token: GateToken);
    fn cancel(&mut self, token: GateToken);
}

/// Arms and disarms per-token timeouts that report back asynchronously
pub trait TimeoutScheduler: Send {
    fn arm(&mut self, token: GateToken, after: Duration);
    fn disarm(&mut self, token: GateToken);
}

pub struct ProximityGate {
    sensor: Option<Box<dyn ProximitySensor>>,
    timer: Box<dyn TimeoutScheduler>,
    /// Outstanding registrations and their timeout
    outstanding: HashMap<GateToken, Duration>,
}

impl ProximityGate {
    /// Create a gate; without a sensor the gate is unavailable
    pub fn new(
        sensor: Option<Box<dyn ProximitySensor>>,
        timer: Box<dyn TimeoutScheduler>,
    ) -> Self {
        Self {
            sensor,
            timer,
            outstanding: HashMap::new(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.sensor.is_some()
    }

    /// Register a token, evicting whatever registration was outstanding
    ///
    /// Returns false, and registers nothing, when no sensor is present.
    pub fn schedule(&mut self, token: GateToken, timeout: Duration) -> bool {
        if self.sensor.is_none() {
            return false;
        }

        self.evict_all();

        if let Some(sensor) = self.sensor.as_mut() {
            sensor.request_sample(token);
        }
        self.timer.arm(token, timeout);
        self.outstanding.insert(token, timeout);
        debug!(%token, ?timeout, "proximity check scheduled");
        true
    }

    /// Cancel every outstanding registration
    pub fn evict_all(&mut self) {
        let tokens: Vec<GateToken> = self.outstanding.drain().map(|(token, _)| token).collect();
        for token in tokens {
            debug!(%token, "proximity check superseded");
            self.release(token);
        }
    }

    /// A sample arrived for `token`
    pub fn on_sample(&mut self, token: GateToken, value: f32) -> Option<ProximityVerdict> {
        if self.outstanding.remove(&token).is_none() {
            debug!(%token, value, "late proximity sample ignored");
            return None;
        }

        self.timer.disarm(token);
        let max_range = self.sensor.as_ref().map(|s| s.max_range())?;
        let verdict = if value == max_range {
            ProximityVerdict::Far
        } else {
            ProximityVerdict::Near
        };
        debug!(%token, value, max_range, ?verdict, "proximity sample");
        Some(verdict)
    }

    /// The timeout for `token` fired
    pub fn on_timeout(&mut self, token: GateToken) -> Option<ProximityVerdict> {
        if self.outstanding.remove(&token).is_none() {
            return None;
        }

        if let Some(sensor) = self.sensor.as_mut() {
            sensor.cancel(token);
        }
        debug!(%token, "proximity check timed out");
        Some(ProximityVerdict::TimedOut)
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn release(&mut self, token: GateToken) {
        if let Some(sensor) = self.sensor.as_mut() {
            sensor.cancel(token);
        }
        self.timer.disarm(token);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a fake sensor or timer was asked to do
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Call {
        Request(GateToken),
        CancelSample(GateToken),
        Arm(GateToken, Duration),
        Disarm(GateToken),
    }

    pub(crate) type CallLog = Arc<Mutex<Vec<Call>>>;

    pub(crate) struct FakeSensor {
        pub(crate) max_range: f32,
        pub(crate) calls: CallLog,
    }

    impl ProximitySensor for FakeSensor {
        fn max_range(&self) -> f32 {
            self.max_range
        }
        fn request_sample(&mut self, token: GateToken) {
            self.calls.lock().unwrap().push(Call::Request(token));
        }
        fn cancel(&mut self, token: GateToken) {
            self.calls.lock().unwrap().push(Call::CancelSample(token));
        }
    }

    pub(crate) struct FakeTimer {
        pub(crate) calls: CallLog,
    }

    impl TimeoutScheduler for FakeTimer {
        fn arm(&mut self, token: GateToken, after: Duration) {
            self.calls.lock().unwrap().push(Call::Arm(token, after));
        }
        fn disarm(&mut self, token: GateToken) {
            self.calls.lock().unwrap().push(Call::Disarm(token));
        }
    }

    pub(crate) fn fake_gate(with_sensor: bool) -> (ProximityGate, CallLog) {
        let calls = CallLog::default();
        let sensor = with_sensor.then(|| {
            Box::new(FakeSensor {
                max_range: 5.0,
                calls: calls.clone(),
            }) as Box<dyn ProximitySensor>
        });
        let timer = Box::new(FakeTimer {
            calls: calls.clone(),
        });
        (ProximityGate::new(sensor, timer), calls)
    }

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn test_schedule_requests_one_sample_and_one_timer() {
        let (mut gate, calls) = fake_gate(true);
        assert!(gate.schedule(GateToken(1), TIMEOUT));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Request(GateToken(1)), Call::Arm(GateToken(1), TIMEOUT)]
        );
        assert_eq!(gate.outstanding(), 1);
    }

    #[test]
    fn test_without_sensor_nothing_is_scheduled() {
        let (mut gate, calls) = fake_gate(false);
        assert!(!gate.is_available());
        assert!(!gate.schedule(GateToken(1), TIMEOUT));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_far_sample_disarms_timer() {
        let (mut gate, calls) = fake_gate(true);
        gate.schedule(GateToken(1), TIMEOUT);
        calls.lock().unwrap().clear();

        assert_eq!(gate.on_sample(GateToken(1), 5.0), Some(ProximityVerdict::Far));
        assert_eq!(*calls.lock().unwrap(), vec![Call::Disarm(GateToken(1))]);
        assert_eq!(gate.on_timeout(GateToken(1)), None);
    }

    #[test]
    fn test_non_max_sample_is_near() {
        let (mut gate, _) = fake_gate(true);
        gate.schedule(GateToken(3), TIMEOUT);
        assert_eq!(gate.on_sample(GateToken(3), 0.0), Some(ProximityVerdict::Near));
    }

    #[test]
    fn test_timeout_wins_and_late_sample_is_ignored() {
        let (mut gate, calls) = fake_gate(true);
        gate.schedule(GateToken(1), TIMEOUT);
        calls.lock().unwrap().clear();

        assert_eq!(gate.on_timeout(GateToken(1)), Some(ProximityVerdict::TimedOut));
        assert_eq!(*calls.lock().unwrap(), vec![Call::CancelSample(GateToken(1))]);
        assert_eq!(gate.on_sample(GateToken(1), 5.0), None);
        assert_eq!(gate.outstanding(), 0);
    }

    #[test]
    fn test_new_registration_evicts_previous() {
        let (mut gate, calls) = fake_gate(true);
        gate.schedule(GateToken(1), TIMEOUT);
        calls.lock().unwrap().clear();

        gate.schedule(GateToken(2), TIMEOUT);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                Call::CancelSample(GateToken(1)),
                Call::Disarm(GateToken(1)),
                Call::Request(GateToken(2)),
                Call::Arm(GateToken(2), TIMEOUT),
            ]
        );
        assert_eq!(gate.on_sample(GateToken(1), 5.0), None);
        assert_eq!(gate.on_sample(GateToken(2), 5.0), Some(ProximityVerdict::Far));
    }
}
