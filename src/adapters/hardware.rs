//! Hardware adapter: bridges the real peripherals to [`SensorPort`].
//!
//! Owns the sensor drivers, the trigger button and the recovery lines, all
//! sharing one [`I2cBus`] through [`SharedBus`].  This is the only module
//! in the system that touches actual hardware; host builds plug in
//! simulated controllers and pins.

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{SensorHealth, SensorPort};
use crate::drivers::bus_recovery::{DEFAULT_PULSES, RecoveryLines};
use crate::drivers::button::DebouncedButton;
use crate::drivers::i2c_bus::{BusController, DeviceAddress, I2cBus, SCAN_CAP, SharedBus};
use crate::error::SensorError;
use crate::sensors::als31300::{ADDRESS_RANGE, Als31300};
use crate::sensors::range::RangeSample;
use crate::sensors::vl6180x::Vl6180x;

/// Addresses probed by a full scan (reserved ranges excluded).
const SCAN_RANGE: core::ops::RangeInclusive<u8> = 0x01..=0x7E;

/// Concrete adapter combining every peripheral behind the sensor port.
pub struct HardwareAdapter<'a, C, SCL, SDA, D, P> {
    bus: &'a RefCell<I2cBus<C>>,
    lines: RecoveryLines<SCL, SDA, D>,
    angle: Option<Als31300<SharedBus<'a, I2cBus<C>>>>,
    range: Vl6180x<SharedBus<'a, I2cBus<C>>>,
    range_ready: bool,
    button: DebouncedButton<P>,
    button_started: bool,
    fallback_angle: DeviceAddress,
    detected_angle: Option<DeviceAddress>,
    heading_weight: f32,
}

impl<'a, C, SCL, SDA, D, P> HardwareAdapter<'a, C, SCL, SDA, D, P>
where
    C: BusController,
    SCL: OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
    P: InputPin,
{
    pub fn new(
        bus: &'a RefCell<I2cBus<C>>,
        lines: RecoveryLines<SCL, SDA, D>,
        button: DebouncedButton<P>,
        fallback_angle: DeviceAddress,
    ) -> Self {
        Self {
            bus,
            lines,
            angle: None,
            range: Vl6180x::new(SharedBus::new(bus)),
            range_ready: false,
            button,
            button_started: false,
            fallback_angle,
            detected_angle: None,
            heading_weight: 1.0,
        }
    }

    /// Weight of the angle sensor's slow heading stage, applied at the
    /// next `init_sensors`.
    pub fn with_heading_weight(mut self, weight: f32) -> Self {
        self.heading_weight = weight;
        self
    }

    /// The angle sensor address found by the last scan, if any.
    pub fn detected_angle(&self) -> Option<DeviceAddress> {
        self.detected_angle
    }

    fn init_range(&mut self) -> bool {
        self.range_ready = match self.range.init() {
            Ok(()) => true,
            Err(e) => {
                warn!("SENSOR | range finder init failed: {}", e);
                false
            }
        };
        self.range_ready
    }

    fn init_angle(&mut self) -> bool {
        let address = self.detected_angle.unwrap_or(self.fallback_angle);
        let mut sensor =
            Als31300::new(SharedBus::new(self.bus), address).with_heading_weight(self.heading_weight);
        match sensor.update() {
            Ok(()) => {
                info!("SENSOR | angle sensor ready at {}", address);
                self.detected_angle = Some(address);
                self.angle = Some(sensor);
                true
            }
            Err(e) => {
                warn!("SENSOR | angle sensor at {} failed: {}", address, e);
                self.angle = None;
                false
            }
        }
    }
}

impl<C, SCL, SDA, D, P> SensorPort for HardwareAdapter<'_, C, SCL, SDA, D, P>
where
    C: BusController,
    SCL: OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
    P: InputPin,
{
    fn recover_bus(&mut self) -> bool {
        self.bus
            .borrow_mut()
            .recover(&mut self.lines, DEFAULT_PULSES, true)
    }

    fn scan_bus(&mut self) -> Vec<DeviceAddress, SCAN_CAP> {
        let found = self.bus.borrow_mut().scan(SCAN_RANGE);
        if let Some(addr) = found.iter().find(|a| ADDRESS_RANGE.contains(&a.raw())) {
            self.detected_angle = Some(*addr);
        }
        found
    }

    fn init_sensors(&mut self) -> SensorHealth {
        SensorHealth {
            range: self.init_range(),
            angle: self.init_angle(),
        }
    }

    fn angle_address(&self) -> Option<DeviceAddress> {
        self.detected_angle
    }

    fn range_responds(&mut self) -> bool {
        self.range.probe()
    }

    fn read_angle(&mut self) -> Result<f32, SensorError> {
        let sensor = self.angle.as_mut().ok_or(SensorError::NotDetected)?;
        sensor.update()?;
        Ok(sensor.smoothed_heading_deg())
    }

    fn read_range(&mut self) -> Result<RangeSample, SensorError> {
        if !self.range_ready {
            return Err(SensorError::NotDetected);
        }
        self.range.read()
    }

    fn poll_button(&mut self, now_ms: u32) -> bool {
        if !self.button_started {
            self.button.begin(now_ms);
            self.button_started = true;
        } else {
            self.button.update(now_ms);
        }
        self.button.pressed()
    }
}
