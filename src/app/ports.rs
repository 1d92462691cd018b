//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (sensors, message client, event sinks) implement these
//! traits.  The [`NodeService`](super::service::NodeService) consumes them
//! via generics, so the sampling pipeline never touches hardware directly.

use heapless::Vec;

use crate::drivers::i2c_bus::{DeviceAddress, SCAN_CAP};
use crate::error::SensorError;
use crate::sensors::range::RangeSample;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Which sensors answered at the last (re)initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorHealth {
    pub angle: bool,
    pub range: bool,
}

impl SensorHealth {
    pub fn all_ok(&self) -> bool {
        self.angle && self.range
    }
}

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// Clock out a stuck bus.  True if SDA is released afterwards.
    fn recover_bus(&mut self) -> bool;

    /// Addresses that ACK on the shared bus.
    fn scan_bus(&mut self) -> Vec<DeviceAddress, SCAN_CAP>;

    /// (Re)detect and initialise every sensor.
    fn init_sensors(&mut self) -> SensorHealth;

    /// Address the angle sensor is bound to, if any.
    fn angle_address(&self) -> Option<DeviceAddress>;

    /// True if the range finder ACKs its address.
    fn range_responds(&mut self) -> bool;

    /// Sample the angle sensor and return its heading in degrees.
    fn read_angle(&mut self) -> Result<f32, SensorError>;

    /// One range measurement.  A non-OK status is still `Ok`.
    fn read_range(&mut self) -> Result<RangeSample, SensorError>;

    /// Poll the trigger and return its debounced level.
    fn poll_button(&mut self, now_ms: u32) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Message publisher port (driven adapter: domain → MQTT)
// ───────────────────────────────────────────────────────────────

/// Outbound message transport.  Connection management is the adapter's
/// business; the domain only publishes.
pub trait MessagePublisher {
    /// Hand one message to the client.  `false` if it was refused.
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: u8) -> bool;

    fn connected(&self) -> bool;
}

impl<T: MessagePublisher + ?Sized> MessagePublisher for &mut T {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, qos: u8) -> bool {
        (**self).publish(topic, payload, retain, qos)
    }

    fn connected(&self) -> bool {
        (**self).connected()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`NodeEvent`](super::events::NodeEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::NodeEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Millisecond uptime that wraps at `u32::MAX`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}
