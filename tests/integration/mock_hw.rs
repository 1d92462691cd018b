//! Mock adapters for integration tests.
//!
//! [`MockHardware`] serves scripted sensor readings and counts every port
//! call; [`MockPublisher`] records every message the node hands to the
//! transport; [`CaptureSink`] keeps every emitted event.

use cannon_node::app::events::NodeEvent;
use cannon_node::app::ports::{EventSink, MessagePublisher, SensorHealth, SensorPort};
use cannon_node::drivers::i2c_bus::{DeviceAddress, SCAN_CAP};
use cannon_node::error::SensorError;
use cannon_node::sensors::range::RangeSample;

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub recover_result: bool,
    pub devices: Vec<DeviceAddress>,
    /// What the next `init_sensors` reports.
    pub health: SensorHealth,
    pub angle_addr: Option<DeviceAddress>,
    pub range_acks: bool,

    pub angle: Result<f32, SensorError>,
    pub range: Result<RangeSample, SensorError>,
    pub button: bool,

    pub recover_calls: u32,
    pub init_calls: u32,
    pub angle_reads: u32,
    pub range_reads: u32,
}

#[allow(dead_code)]
impl MockHardware {
    /// Both sensors present and answering.
    pub fn healthy() -> Self {
        Self {
            recover_result: true,
            devices: vec![DeviceAddress::new(0x29), DeviceAddress::new(0x65)],
            health: SensorHealth {
                angle: true,
                range: true,
            },
            angle_addr: Some(DeviceAddress::new(0x65)),
            range_acks: true,
            angle: Ok(0.0),
            range: Ok(RangeSample {
                mm: 0,
                status: 11,
            }),
            button: false,
            recover_calls: 0,
            init_calls: 0,
            angle_reads: 0,
            range_reads: 0,
        }
    }

    /// Nothing on the bus.
    pub fn empty() -> Self {
        Self {
            devices: vec![],
            health: SensorHealth::default(),
            angle_addr: None,
            range_acks: false,
            angle: Err(SensorError::NotDetected),
            range: Err(SensorError::NotDetected),
            ..Self::healthy()
        }
    }
}

impl SensorPort for MockHardware {
    fn recover_bus(&mut self) -> bool {
        self.recover_calls += 1;
        self.recover_result
    }

    fn scan_bus(&mut self) -> heapless::Vec<DeviceAddress, SCAN_CAP> {
        self.devices.iter().copied().take(SCAN_CAP).collect()
    }

    fn init_sensors(&mut self) -> SensorHealth {
        self.init_calls += 1;
        self.health
    }

    fn angle_address(&self) -> Option<DeviceAddress> {
        self.angle_addr
    }

    fn range_responds(&mut self) -> bool {
        self.range_acks
    }

    fn read_angle(&mut self) -> Result<f32, SensorError> {
        self.angle_reads += 1;
        self.angle
    }

    fn read_range(&mut self) -> Result<RangeSample, SensorError> {
        self.range_reads += 1;
        self.range
    }

    fn poll_button(&mut self, _now_ms: u32) -> bool {
        self.button
    }
}

// ── MockPublisher ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Records accepted publishes.  While disconnected every publish is
/// refused and nothing is recorded.  `refusing` keeps the session up but
/// rejects every publish, like a full outbox.
pub struct MockPublisher {
    pub sent: Vec<Published>,
    pub connected: bool,
    pub refusing: bool,
}

#[allow(dead_code)]
impl MockPublisher {
    pub fn connected() -> Self {
        Self {
            sent: Vec::new(),
            connected: true,
            refusing: false,
        }
    }

    pub fn offline() -> Self {
        Self {
            sent: Vec::new(),
            connected: false,
            refusing: false,
        }
    }

    /// Payloads published on `topic`, oldest first.
    pub fn on(&self, topic: &str) -> Vec<&str> {
        self.sent
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.as_str())
            .collect()
    }

    pub fn last_on(&self, topic: &str) -> Option<&Published> {
        self.sent.iter().rev().find(|p| p.topic == topic)
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl MessagePublisher for MockPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool, _qos: u8) -> bool {
        if !self.connected || self.refusing {
            return false;
        }
        self.sent.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            retain,
        });
        true
    }

    fn connected(&self) -> bool {
        self.connected
    }
}

// ── CaptureSink ───────────────────────────────────────────────

#[derive(Default)]
pub struct CaptureSink {
    pub events: Vec<NodeEvent>,
}

#[allow(dead_code)]
impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&NodeEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&mut self, event: &NodeEvent) {
        self.events.push(event.clone());
    }
}
