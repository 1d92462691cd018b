//! ST VL6180X time-of-flight range finder, single-shot ranging.
//!
//! Registers are addressed with a 16-bit big-endian index and hold one
//! byte each.  Ranging is polled: start, wait for the interrupt status,
//! read the result, clear.
//!
//! Datasheet: ST DS10355 and application note AN4545 (mandatory private
//! register settings after fresh reset).

use log::{debug, info};

use super::range::{RANGE_ADDRESS, RangeSample};
use crate::drivers::i2c_bus::{DeviceAddress, Transport};
use crate::error::{BusError, SensorError};

const REG_MODEL_ID: u16 = 0x000;
const REG_INTERRUPT_CLEAR: u16 = 0x015;
const REG_FRESH_OUT_OF_RESET: u16 = 0x016;
const REG_SYSRANGE_START: u16 = 0x018;
const REG_RESULT_RANGE_STATUS: u16 = 0x04D;
const REG_RESULT_INTERRUPT_STATUS: u16 = 0x04F;
const REG_RESULT_RANGE_VAL: u16 = 0x062;

const MODEL_ID: u8 = 0xB4;

/// Polls before a pending measurement is declared lost.
const MAX_POLLS: u16 = 200;

/// AN4545 private settings followed by the recommended public defaults.
const INIT_SETTINGS: [(u16, u8); 39] = [
    (0x0207, 0x01),
    (0x0208, 0x01),
    (0x0096, 0x00),
    (0x0097, 0xFD),
    (0x00E3, 0x00),
    (0x00E4, 0x04),
    (0x00E5, 0x02),
    (0x00E6, 0x01),
    (0x00E7, 0x03),
    (0x00F5, 0x02),
    (0x00D9, 0x05),
    (0x00DB, 0xCE),
    (0x00DC, 0x03),
    (0x00DD, 0xF8),
    (0x009F, 0x00),
    (0x00A3, 0x3C),
    (0x00B7, 0x00),
    (0x00BB, 0x3C),
    (0x00B2, 0x09),
    (0x00CA, 0x09),
    (0x0198, 0x01),
    (0x01B0, 0x17),
    (0x01AD, 0x00),
    (0x00FF, 0x05),
    (0x0100, 0x05),
    (0x0199, 0x05),
    (0x01A6, 0x1B),
    (0x01AC, 0x3E),
    (0x01A7, 0x1F),
    (0x0030, 0x00),
    // public
    (0x0011, 0x10),
    (0x010A, 0x30),
    (0x003F, 0x46),
    (0x0031, 0xFF),
    (0x0041, 0x63),
    (0x002E, 0x01),
    (0x001B, 0x09),
    (0x003E, 0x31),
    (0x0014, 0x24),
];

pub struct Vl6180x<T> {
    bus: T,
    address: DeviceAddress,
}

impl<T: Transport> Vl6180x<T> {
    pub fn new(bus: T) -> Self {
        Self {
            bus,
            address: RANGE_ADDRESS,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn probe(&mut self) -> bool {
        self.bus.probe(self.address)
    }

    fn read_u8(&mut self, reg: u16) -> Result<u8, SensorError> {
        let mut out = [0u8; 1];
        self.bus
            .read_indexed(self.address, &reg.to_be_bytes(), &mut out)?;
        Ok(out[0])
    }

    fn write_u8(&mut self, reg: u16, value: u8) -> Result<(), SensorError> {
        let [hi, lo] = reg.to_be_bytes();
        self.bus.write(self.address, &[hi, lo, value])?;
        Ok(())
    }

    /// Check identity and load the tuning settings.
    pub fn init(&mut self) -> Result<(), SensorError> {
        let id = self.read_u8(REG_MODEL_ID)?;
        if id != MODEL_ID {
            debug!("vl6180x: unexpected model id 0x{:02X}", id);
            return Err(SensorError::NotDetected);
        }
        for (reg, value) in INIT_SETTINGS {
            self.write_u8(reg, value)?;
        }
        self.write_u8(REG_FRESH_OUT_OF_RESET, 0x00)?;
        info!("vl6180x: ready at {}", self.address);
        Ok(())
    }

    fn wait_for(&mut self, reg: u16, mask: u8, want: u8) -> Result<u8, SensorError> {
        for _ in 0..MAX_POLLS {
            let v = self.read_u8(reg)?;
            if v & mask == want {
                return Ok(v);
            }
        }
        Err(SensorError::Bus(BusError::Timeout))
    }

    /// One single-shot measurement.  The status nibble is reported as-is.
    pub fn read(&mut self) -> Result<RangeSample, SensorError> {
        self.wait_for(REG_RESULT_RANGE_STATUS, 0x01, 0x01)?;
        self.write_u8(REG_SYSRANGE_START, 0x01)?;
        self.wait_for(REG_RESULT_INTERRUPT_STATUS, 0x07, 0x04)?;
        let mm = self.read_u8(REG_RESULT_RANGE_VAL)?;
        self.write_u8(REG_INTERRUPT_CLEAR, 0x07)?;
        let status = self.read_u8(REG_RESULT_RANGE_STATUS)? >> 4;
        Ok(RangeSample {
            mm: u16::from(mm),
            status,
        })
    }
}
