//! Allegro ALS31300 3-D linear Hall sensor, used as the cannon's
//! horizontal angle encoder.
//!
//! Each [`update`](Als31300::update) reads the MSB (0x28) and LSB (0x29)
//! registers, reassembles the signed X/Y/Z field readings and folds them
//! into an exponential moving average.  The heading is `atan2(y, x)`.
//!
//! ## Filtering
//!
//! | Stage   | Form                                   | Default      |
//! |---------|----------------------------------------|--------------|
//! | Axes    | `f = (raw + f*(N-1)) / N`              | N = 32       |
//! | Heading | unit-vector blend of old and new angle | weight 1.0   |
//!
//! The axis average is seeded with the first successful sample so the
//! first readings are not pulled toward zero.  A heading weight of 1.0
//! reports the axis heading as-is; lower weights add a second, slower
//! stage that stays continuous across 0/360.

use log::{info, warn};

use super::als31300_regs::{
    CUSTOMER_ACCESS_CODE, EepromRegister02, LsbRegister, MsbRegister, REG_CUSTOMER_ACCESS,
    REG_EEPROM_02, REG_LSB_29, REG_MSB_28, assemble_axis,
};
use super::heading::{angle_from_xy, circular_blend, quantize_deg};
use crate::drivers::i2c_bus::{DeviceAddress, Transport};
use crate::error::SensorError;

/// Axis filter weight.
pub const AXIS_FILTER_N: f32 = 32.0;

/// Factory default 7-bit address range (ADR pins select within it).
pub const ADDRESS_RANGE: core::ops::RangeInclusive<u8> = 0x60..=0x6F;

/// One reassembled reading, not retained past the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Smoothed field strengths.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilteredSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl FilteredSample {
    fn fold(&mut self, raw: RawSample) {
        let n = AXIS_FILTER_N;
        self.x = (f32::from(raw.x) + self.x * (n - 1.0)) / n;
        self.y = (f32::from(raw.y) + self.y * (n - 1.0)) / n;
        self.z = (f32::from(raw.z) + self.z * (n - 1.0)) / n;
    }
}

impl From<RawSample> for FilteredSample {
    fn from(raw: RawSample) -> Self {
        Self {
            x: f32::from(raw.x),
            y: f32::from(raw.y),
            z: f32::from(raw.z),
        }
    }
}

pub struct Als31300<T> {
    bus: T,
    address: DeviceAddress,
    filtered: FilteredSample,
    seeded: bool,
    heading_weight: f32,
    avg_heading: Option<f32>,
}

impl<T: Transport> Als31300<T> {
    pub fn new(bus: T, address: DeviceAddress) -> Self {
        Self {
            bus,
            address,
            filtered: FilteredSample::default(),
            seeded: false,
            heading_weight: 1.0,
            avg_heading: None,
        }
    }

    /// Share of each new heading in the slow heading stage (0 < w <= 1).
    pub fn with_heading_weight(mut self, weight: f32) -> Self {
        self.heading_weight = weight.clamp(f32::EPSILON, 1.0);
        self
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn filtered(&self) -> FilteredSample {
        self.filtered
    }

    /// True if the sensor ACKs its address.
    pub fn probe(&mut self) -> bool {
        self.bus.probe(self.address)
    }

    fn read_register(&mut self, reg: u8) -> Result<u32, SensorError> {
        let mut buf = [0u8; 4];
        self.bus.read_indexed(self.address, &[reg], &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn write_register(&mut self, reg: u8, value: u32) -> Result<(), SensorError> {
        let [b3, b2, b1, b0] = value.to_be_bytes();
        self.bus.write(self.address, &[reg, b3, b2, b1, b0])?;
        Ok(())
    }

    /// Read both data registers and reassemble one sample.
    pub fn read_raw(&mut self) -> Result<RawSample, SensorError> {
        let msb = MsbRegister::decode(self.read_register(REG_MSB_28)?);
        let lsb = LsbRegister::decode(self.read_register(REG_LSB_29)?);
        Ok(RawSample {
            x: assemble_axis(msb.x_msb, lsb.x_lsb),
            y: assemble_axis(msb.y_msb, lsb.y_lsb),
            z: assemble_axis(msb.z_msb, lsb.z_lsb),
        })
    }

    /// One sampling cycle.  On error the filtered state is untouched and
    /// the last good heading still applies.
    pub fn update(&mut self) -> Result<(), SensorError> {
        let raw = self.read_raw()?;
        if self.seeded {
            self.filtered.fold(raw);
        } else {
            self.filtered = raw.into();
            self.seeded = true;
        }
        Ok(())
    }

    /// Unsmoothed heading of the filtered X/Y field, [0, 360).
    pub fn heading_deg(&self) -> f32 {
        angle_from_xy(self.filtered.x, self.filtered.y)
    }

    /// Advance the slow heading stage and return its average, [0, 360).
    ///
    /// The first call seeds the average with the axis heading.
    pub fn smoothed_heading_deg(&mut self) -> f32 {
        let now = self.heading_deg();
        let avg = match self.avg_heading {
            Some(prev) => circular_blend(prev, now, self.heading_weight),
            None => now,
        };
        self.avg_heading = Some(avg);
        avg
    }

    /// Reported heading in whole degrees, 0..=359.  Advances the slow
    /// heading stage like [`smoothed_heading_deg`](Self::smoothed_heading_deg).
    pub fn heading(&mut self) -> u16 {
        quantize_deg(self.smoothed_heading_deg())
    }

    /// Rewrite the device's EEPROM address. Takes effect after a power
    /// cycle.
    ///
    /// Administrative only: never call while the sampling loop owns the
    /// sensor.  After a failure the device state is unknown and the
    /// instance must be re-detected before reuse.
    pub fn program_address(&mut self, new_address: DeviceAddress) -> Result<(), SensorError> {
        let result = self.program_address_inner(new_address);
        match result {
            Ok(()) => info!(
                "als31300: address {} -> {} programmed; power cycle to apply",
                self.address, new_address
            ),
            Err(e) => warn!("als31300: address programming failed at {}: {}", self.address, e),
        }
        result.map_err(|_| SensorError::ConfigurationFailed)
    }

    fn program_address_inner(&mut self, new_address: DeviceAddress) -> Result<(), SensorError> {
        self.write_register(REG_CUSTOMER_ACCESS, CUSTOMER_ACCESS_CODE)?;
        let reg = EepromRegister02(self.read_register(REG_EEPROM_02)?);
        self.write_register(REG_EEPROM_02, reg.with_slave_address(new_address.raw()).0)
    }
}
