//! Proximity gating for gestures that may fire in a pocket

mod gate;
mod sensor;

pub use gate::{GateToken, ProximityGate, ProximitySensor, ProximityVerdict, TimeoutScheduler};
pub use sensor::{IioProximitySensor, TokioTimeouts};

#[cfg(test)]
pub(crate) use gate::tests::{fake_gate, Call, CallLog};
