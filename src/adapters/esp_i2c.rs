//! ESP-IDF two-wire controller and recovery lines.
//!
//! [`EspI2c`] implements [`BusController`] on top of `esp_idf_hal`'s
//! `I2cDriver`.  Detaching drops the driver so the pins return to the GPIO
//! matrix; attaching builds a fresh driver from the same peripheral.
//!
//! [`OpenDrainLine`] drives a bus pin directly through the GPIO API while
//! the controller is detached.  It addresses the pin by number so it can
//! coexist with the controller that owns the pin between recoveries.

use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2C0, I2cConfig, I2cDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::sys::{self, EspError, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use log::debug;

use crate::drivers::i2c_bus::BusController;
use crate::error::BusError;

/// Controller failure as seen through embedded-hal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspI2cError(ErrorKind);

impl embedded_hal::i2c::Error for EspI2cError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

fn kind_of(e: &EspError) -> ErrorKind {
    let code = e.code();
    // The legacy driver reports a missing ACK as a generic failure.
    if code == sys::ESP_FAIL {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
    } else if code == sys::ESP_ERR_TIMEOUT as i32 {
        ErrorKind::Bus
    } else {
        ErrorKind::Other
    }
}

pub struct EspI2c {
    i2c: I2C0,
    sda: AnyIOPin,
    scl: AnyIOPin,
    driver: Option<I2cDriver<'static>>,
    clock_hz: u32,
    timeout_ms: u16,
}

impl EspI2c {
    pub fn new(i2c: I2C0, sda: AnyIOPin, scl: AnyIOPin) -> Self {
        Self {
            i2c,
            sda,
            scl,
            driver: None,
            clock_hz: 0,
            timeout_ms: 0,
        }
    }

    fn build(&mut self) -> Result<(), BusError> {
        self.driver = None;
        let config = I2cConfig::new().baudrate(Hertz(self.clock_hz));
        // SAFETY: the previous driver was dropped above, so this is the only
        // live handle to the peripheral and its pins.
        let driver = unsafe {
            I2cDriver::new(
                self.i2c.clone_unchecked(),
                self.sda.clone_unchecked(),
                self.scl.clone_unchecked(),
                &config,
            )
        }
        .map_err(|e| {
            debug!("esp_i2c: driver install failed: {}", e);
            BusError::NotInitialised
        })?;
        self.driver = Some(driver);
        Ok(())
    }
}

impl ErrorType for EspI2c {
    type Error = EspI2cError;
}

impl I2c for EspI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let ticks = TickType::new_millis(u64::from(self.timeout_ms)).ticks();
        let driver = self
            .driver
            .as_mut()
            .ok_or(EspI2cError(ErrorKind::Bus))?;
        driver
            .transaction(address, operations, ticks)
            .map_err(|e| EspI2cError(kind_of(&e)))
    }
}

impl BusController for EspI2c {
    fn attach(&mut self, clock_hz: u32, timeout_ms: u16) -> Result<(), BusError> {
        self.clock_hz = clock_hz;
        self.timeout_ms = timeout_ms;
        self.build()
    }

    fn detach(&mut self) {
        self.driver = None;
    }

    fn set_clock(&mut self, clock_hz: u32) -> Result<(), BusError> {
        self.clock_hz = clock_hz;
        self.build()
    }
}

// ───────────────────────────────────────────────────────────────
// Recovery lines
// ───────────────────────────────────────────────────────────────

/// A bus pin driven as open-drain GPIO by number.
pub struct OpenDrainLine {
    gpio: i32,
}

impl OpenDrainLine {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    fn claim(&self) -> Result<(), EspError> {
        // SAFETY: plain register writes on a pin number validated at boot.
        sys::esp!(unsafe {
            sys::gpio_set_direction(self.gpio, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD)
        })
    }

    fn level(&mut self, high: bool) -> Result<(), EspError> {
        self.claim()?;
        // SAFETY: as above.
        sys::esp!(unsafe { sys::gpio_set_level(self.gpio, u32::from(high)) })
    }
}

impl embedded_hal::digital::ErrorType for OpenDrainLine {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for OpenDrainLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if let Err(e) = self.level(false) {
            debug!("esp_i2c: gpio {} set_low: {}", self.gpio, e);
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        if let Err(e) = self.level(true) {
            debug!("esp_i2c: gpio {} set_high: {}", self.gpio, e);
        }
        Ok(())
    }
}

impl embedded_hal::digital::InputPin for OpenDrainLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        // SAFETY: reading the input register has no side effects.
        Ok(unsafe { sys::gpio_get_level(self.gpio) } != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|h| !h)
    }
}
