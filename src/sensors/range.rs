//! Time-of-flight range readings and the loop-level smoothing filter.
//!
//! The ranging device itself is reached through
//! [`SensorPort`](crate::app::ports::SensorPort); this module only defines
//! what a reading looks like and how the loop smooths it.

use crate::drivers::i2c_bus::DeviceAddress;

/// Fixed address of the VL6180X range finder.
pub const RANGE_ADDRESS: DeviceAddress = DeviceAddress::new(0x29);

/// Status code the ranging device reports for a good measurement.
pub const STATUS_OK: u8 = 0;

/// Status codes that are routine on this mount (ECE check failure, VCSEL
/// watchdog).  They still invalidate the reading but are not logged.
pub const QUIET_STATUS_CODES: [u8; 2] = [6, 11];

/// One range measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeSample {
    pub mm: u16,
    /// Device status code; [`STATUS_OK`] means `mm` is usable.
    pub status: u8,
}

impl RangeSample {
    pub const fn ok(mm: u16) -> Self {
        Self {
            mm,
            status: STATUS_OK,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Exponentially weighted moving average over valid readings.
#[derive(Debug, Clone, Copy)]
pub struct RangeFilter {
    alpha: f32,
    value: Option<f32>,
}

impl RangeFilter {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            value: None,
        }
    }

    /// Fold one sample.  Invalid samples are ignored.
    pub fn push(&mut self, sample: RangeSample) {
        if !sample.is_valid() {
            return;
        }
        let mm = f32::from(sample.mm);
        self.value = Some(match self.value {
            Some(prev) => self.alpha * mm + (1.0 - self.alpha) * prev,
            None => mm,
        });
    }

    /// Smoothed range, 0 until the first valid reading.
    pub fn value_mm(&self) -> u16 {
        self.value.map_or(0, |v| v.round().clamp(0.0, f32::from(u16::MAX)) as u16)
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
