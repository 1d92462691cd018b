//! Two-wire (I2C) bus transport.
//!
//! [`I2cBus`] owns one platform controller plus its [`BusConfig`] and
//! exposes the three primitives every driver in this firmware needs:
//! address probe, write-with-STOP and indexed read (index write, repeated
//! START, read).  Stuck-bus recovery lives in
//! [`bus_recovery`](super::bus_recovery).
//!
//! Drivers never reach the bus through a global.  They receive a
//! [`Transport`] in their constructor: either `&mut I2cBus` directly or a
//! [`SharedBus`] when several drivers sit on the same wires.
//!
//! ```text
//!  Als31300 ──┐
//!             ├──▶ SharedBus ──▶ RefCell<I2cBus<C>> ──▶ C: BusController
//!  Vl6180x ───┘
//! ```

use core::cell::RefCell;
use core::ops::RangeInclusive;

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{debug, info};

use crate::error::BusError;

/// Standard-mode clock used when stepping back in after recovery.
pub const SLOW_CLOCK_HZ: u32 = 100_000;

/// Upper bound on devices reported by a single scan.
pub const SCAN_CAP: usize = 16;

// ───────────────────────────────────────────────────────────────
// Addressing and configuration
// ───────────────────────────────────────────────────────────────

/// 7-bit peripheral address.  Construction discards bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    pub const fn new(raw: u8) -> Self {
        Self(raw & 0x7F)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Physical bus parameters.  Fixed at construction; only the live clock
/// rate is touched during recovery and it is always restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub sda_gpio: i32,
    pub scl_gpio: i32,
    pub clock_hz: u32,
    pub timeout_ms: u16,
}

impl BusConfig {
    pub fn from_node(cfg: &crate::config::NodeConfig) -> Self {
        Self {
            sda_gpio: cfg.i2c_sda_gpio,
            scl_gpio: cfg.i2c_scl_gpio,
            clock_hz: cfg.i2c_clock_hz,
            timeout_ms: cfg.i2c_timeout_ms,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Controller boundary
// ───────────────────────────────────────────────────────────────

/// A platform I2C controller that can be released from its pins.
///
/// Transfers come from [`embedded_hal::i2c::I2c`]; this trait adds the
/// attach/detach lifecycle that recovery needs to take the lines over as
/// plain GPIO.
pub trait BusController: I2c {
    /// Bind the controller to its pins at `clock_hz`.
    fn attach(&mut self, clock_hz: u32, timeout_ms: u16) -> Result<(), BusError>;

    /// Release the pins.  Transfers fail until the next `attach`.
    fn detach(&mut self);

    /// Change the clock of an attached controller.
    fn set_clock(&mut self, clock_hz: u32) -> Result<(), BusError>;
}

/// Map an embedded-hal error onto the firmware's bus taxonomy.
pub fn map_error<E: embedded_hal::i2c::Error>(e: &E) -> BusError {
    match e.kind() {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        ErrorKind::ArbitrationLoss => BusError::ArbitrationLoss,
        ErrorKind::Bus => BusError::Bus,
        ErrorKind::Overrun => BusError::Overrun,
        _ => BusError::Other,
    }
}

// ───────────────────────────────────────────────────────────────
// Transport capability (what drivers see)
// ───────────────────────────────────────────────────────────────

/// Bus primitives handed to device drivers.
pub trait Transport {
    /// True iff a device ACKs a zero-length write.
    fn probe(&mut self, address: DeviceAddress) -> bool;

    /// Write `bytes` and release the bus with STOP.
    fn write(&mut self, address: DeviceAddress, bytes: &[u8]) -> Result<(), BusError>;

    /// Write `index` without STOP, repeated START, read exactly `out.len()`
    /// bytes.
    fn read_indexed(
        &mut self,
        address: DeviceAddress,
        index: &[u8],
        out: &mut [u8],
    ) -> Result<(), BusError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn probe(&mut self, address: DeviceAddress) -> bool {
        (**self).probe(address)
    }

    fn write(&mut self, address: DeviceAddress, bytes: &[u8]) -> Result<(), BusError> {
        (**self).write(address, bytes)
    }

    fn read_indexed(
        &mut self,
        address: DeviceAddress,
        index: &[u8],
        out: &mut [u8],
    ) -> Result<(), BusError> {
        (**self).read_indexed(address, index, out)
    }
}

/// Shares one bus between several single-threaded drivers.
///
/// Each call borrows the bus for the duration of one transaction only.
pub struct SharedBus<'a, T> {
    bus: &'a RefCell<T>,
}

impl<'a, T> SharedBus<'a, T> {
    pub fn new(bus: &'a RefCell<T>) -> Self {
        Self { bus }
    }
}

impl<T> Clone for SharedBus<'_, T> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<T: Transport> Transport for SharedBus<'_, T> {
    fn probe(&mut self, address: DeviceAddress) -> bool {
        self.bus.borrow_mut().probe(address)
    }

    fn write(&mut self, address: DeviceAddress, bytes: &[u8]) -> Result<(), BusError> {
        self.bus.borrow_mut().write(address, bytes)
    }

    fn read_indexed(
        &mut self,
        address: DeviceAddress,
        index: &[u8],
        out: &mut [u8],
    ) -> Result<(), BusError> {
        self.bus.borrow_mut().read_indexed(address, index, out)
    }
}

// ───────────────────────────────────────────────────────────────
// I2cBus
// ───────────────────────────────────────────────────────────────

pub struct I2cBus<C> {
    pub(super) config: BusConfig,
    pub(super) controller: C,
    pub(super) attached: bool,
}

impl<C: BusController> I2cBus<C> {
    pub fn new(controller: C, config: BusConfig) -> Self {
        Self {
            config,
            controller,
            attached: false,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Access the controller (tests and diagnostics).
    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut C {
        &mut self.controller
    }

    /// Attach the controller at the configured rate.  Safe to call any
    /// number of times; only the first call touches hardware.
    pub fn begin(&mut self) -> Result<(), BusError> {
        if self.attached {
            return Ok(());
        }
        self.controller
            .attach(self.config.clock_hz, self.config.timeout_ms)?;
        self.attached = true;
        debug!(
            "i2c: attached sda={} scl={} @ {} Hz",
            self.config.sda_gpio, self.config.scl_gpio, self.config.clock_hz
        );
        Ok(())
    }

    pub fn probe(&mut self, address: DeviceAddress) -> bool {
        if self.begin().is_err() {
            return false;
        }
        self.controller.write(address.raw(), &[]).is_ok()
    }

    pub fn write(&mut self, address: DeviceAddress, bytes: &[u8]) -> Result<(), BusError> {
        self.begin()?;
        self.controller
            .write(address.raw(), bytes)
            .map_err(|e| map_error(&e))
    }

    pub fn read_indexed(
        &mut self,
        address: DeviceAddress,
        index: &[u8],
        out: &mut [u8],
    ) -> Result<(), BusError> {
        self.begin()?;
        self.controller
            .write_read(address.raw(), index, out)
            .map_err(|e| map_error(&e))
    }

    /// Probe every address in `range` and return those that ACK.
    ///
    /// Stops collecting after [`SCAN_CAP`] hits.
    pub fn scan(&mut self, range: RangeInclusive<u8>) -> heapless::Vec<DeviceAddress, SCAN_CAP> {
        let mut found = heapless::Vec::new();
        for raw in range {
            let addr = DeviceAddress::new(raw);
            if self.probe(addr) && found.push(addr).is_err() {
                break;
            }
        }
        info!("i2c: scan found {} device(s)", found.len());
        for addr in &found {
            info!("i2c: device at {}", addr);
        }
        found
    }
}

impl<C: BusController> Transport for I2cBus<C> {
    fn probe(&mut self, address: DeviceAddress) -> bool {
        I2cBus::probe(self, address)
    }

    fn write(&mut self, address: DeviceAddress, bytes: &[u8]) -> Result<(), BusError> {
        I2cBus::write(self, address, bytes)
    }

    fn read_indexed(
        &mut self,
        address: DeviceAddress,
        index: &[u8],
        out: &mut [u8],
    ) -> Result<(), BusError> {
        I2cBus::read_indexed(self, address, index, out)
    }
}


#[cfg(test)]
mod tests {
    use super::sim::SimController;
    use super::*;

    fn bus_with(addr: u8) -> I2cBus<SimController> {
        I2cBus::new(
            SimController::with_device(addr),
            BusConfig {
                sda_gpio: 15,
                scl_gpio: 18,
                clock_hz: 400_000,
                timeout_ms: 50,
            },
        )
    }

    #[test]
    fn address_is_masked_to_seven_bits() {
        assert_eq!(DeviceAddress::new(0xE5).raw(), 0x65);
    }

    #[test]
    fn begin_is_idempotent() {
        let mut bus = bus_with(0x65);
        bus.begin().unwrap();
        bus.begin().unwrap();
        assert_eq!(bus.controller().attach_calls, vec![400_000]);
    }

    #[test]
    fn probe_acks_only_present_devices() {
        let mut bus = bus_with(0x65);
        assert!(bus.probe(DeviceAddress::new(0x65)));
        assert!(!bus.probe(DeviceAddress::new(0x29)));
    }

    #[test]
    fn indexed_read_returns_register_word() {
        let mut bus = bus_with(0x65);
        bus.controller.set_register(0x65, 0x28, 0xDEAD_BEEF);
        let mut out = [0u8; 4];
        bus.read_indexed(DeviceAddress::new(0x65), &[0x28], &mut out)
            .unwrap();
        assert_eq!(out, [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn nack_surfaces_as_bus_error() {
        let mut bus = bus_with(0x65);
        let err = bus.write(DeviceAddress::new(0x10), &[1, 2]).unwrap_err();
        assert_eq!(err, BusError::Nack);
    }

    #[test]
    fn short_read_is_a_failure() {
        let mut bus = bus_with(0x65);
        bus.controller.short_reads = 1;
        let mut out = [0u8; 4];
        assert!(bus
            .read_indexed(DeviceAddress::new(0x65), &[0x28], &mut out)
            .is_err());
    }

    #[test]
    fn scan_lists_acking_addresses() {
        let mut bus = bus_with(0x65);
        bus.controller.devices.insert(0x29, Default::default());
        let found = bus.scan(0x01..=0x7E);
        assert_eq!(
            found.as_slice(),
            &[DeviceAddress::new(0x29), DeviceAddress::new(0x65)]
        );
    }

    #[test]
    fn shared_bus_routes_to_the_same_controller() {
        let bus = RefCell::new(bus_with(0x65));
        let mut a = SharedBus::new(&bus);
        let mut b = a.clone();
        assert!(a.probe(DeviceAddress::new(0x65)));
        b.write(DeviceAddress::new(0x65), &[0x02, 0, 0, 0, 1]).unwrap();
        assert_eq!(bus.borrow().controller().writes.len(), 2);
    }
}
