//! Stuck-bus recovery.
//!
//! A peripheral that lost clock sync mid-byte can hold SDA low forever.
//! The fix is the standard nine-clock sequence: take the lines over as
//! open-drain GPIO, clock SCL until the device lets go of SDA, issue a STOP
//! by hand, then give the lines back to the controller.
//!
//! Recovery is never automatic.  The service calls it once at boot and the
//! caller may call it again after repeated transaction failures.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use super::i2c_bus::{BusController, I2cBus, SLOW_CLOCK_HZ};

/// Clock half-period while bit-banging.
const HALF_PERIOD_US: u32 = 5;

/// Default number of SCL pulses (one byte plus ACK).
pub const DEFAULT_PULSES: u8 = 9;

/// The bus lines as plain open-drain GPIO plus a microsecond delay.
///
/// `SDA` must be readable while configured as open-drain output
/// (released = high through the pull-up).
pub struct RecoveryLines<SCL, SDA, D> {
    pub scl: SCL,
    pub sda: SDA,
    pub delay: D,
}

impl<SCL, SDA, D> RecoveryLines<SCL, SDA, D>
where
    SCL: OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(scl: SCL, sda: SDA, delay: D) -> Self {
        Self { scl, sda, delay }
    }

    /// A pin-level read error counts as "still held low".
    fn sda_high(&mut self) -> bool {
        self.sda.is_high().unwrap_or(false)
    }

    fn half_period(&mut self) {
        self.delay.delay_us(HALF_PERIOD_US);
    }

    /// Clock SCL while SDA is low.  Returns the number of pulses issued.
    fn clock_out(&mut self, pulses: u8) -> u8 {
        let mut issued = 0;
        while issued < pulses && !self.sda_high() {
            let _ = self.scl.set_low();
            self.half_period();
            let _ = self.scl.set_high();
            self.half_period();
            issued += 1;
        }
        issued
    }

    /// SDA low -> high while SCL is high.
    fn stop_condition(&mut self) {
        let _ = self.scl.set_high();
        self.half_period();
        let _ = self.sda.set_low();
        self.half_period();
        let _ = self.sda.set_high();
        self.half_period();
    }
}

impl<C: BusController> I2cBus<C> {
    /// Free a bus whose SDA line is held low by a peripheral.
    ///
    /// Returns `true` iff SDA reads high after the forced STOP.  The
    /// controller is always re-attached, at [`SLOW_CLOCK_HZ`] first when
    /// `slow_first` is set and then at the configured rate.
    pub fn recover<SCL, SDA, D>(
        &mut self,
        lines: &mut RecoveryLines<SCL, SDA, D>,
        pulses: u8,
        slow_first: bool,
    ) -> bool
    where
        SCL: OutputPin,
        SDA: InputPin + OutputPin,
        D: DelayNs,
    {
        // 1. Give the pins to GPIO.
        if self.attached {
            self.controller.detach();
            self.attached = false;
        }

        // 2. Release both lines and clock SCL until SDA is free.
        let _ = lines.scl.set_high();
        let _ = lines.sda.set_high();
        lines.half_period();
        let issued = lines.clock_out(pulses);

        // 3. Manual STOP.
        lines.stop_condition();
        let freed = lines.sda_high();

        // 4. Hand the pins back.
        let target_hz = self.config.clock_hz;
        let step_hz = if slow_first { SLOW_CLOCK_HZ } else { target_hz };
        match self.controller.attach(step_hz, self.config.timeout_ms) {
            Ok(()) => {
                self.attached = true;
                if step_hz != target_hz {
                    if let Err(e) = self.controller.set_clock(target_hz) {
                        warn!("i2c: clock restore to {} Hz failed: {}", target_hz, e);
                    }
                }
            }
            Err(e) => warn!("i2c: re-attach after recovery failed: {}", e),
        }

        if freed {
            info!("i2c: bus recovery ok after {} pulse(s)", issued);
        } else {
            warn!("i2c: SDA still low after {} pulse(s)", issued);
        }
        freed
    }
}
