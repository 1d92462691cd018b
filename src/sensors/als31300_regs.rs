//! ALS31300 register layouts, decoded with explicit shifts and masks.
//!
//! All registers are 32-bit big-endian words on the wire.
//! Datasheet: Allegro ALS31300, "Register Map".

/// EEPROM: address, channel enables, bandwidth.
pub const REG_EEPROM_02: u8 = 0x02;
/// Volatile: MSBs of X/Y/Z plus temperature MSBs and flags.
pub const REG_MSB_28: u8 = 0x28;
/// Volatile: LSBs of X/Y/Z plus temperature LSBs and hall status.
pub const REG_LSB_29: u8 = 0x29;
/// Customer access register.
pub const REG_CUSTOMER_ACCESS: u8 = 0x35;
/// Written to [`REG_CUSTOMER_ACCESS`] to unlock EEPROM writes.
pub const CUSTOMER_ACCESS_CODE: u32 = 0x2C41_3534;

#[inline]
const fn field(raw: u32, shift: u32, width: u32) -> u32 {
    (raw >> shift) & ((1 << width) - 1)
}

/// Register 0x28.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsbRegister {
    pub x_msb: u8,
    pub y_msb: u8,
    pub z_msb: u8,
    pub new_data: bool,
    pub interrupt: bool,
    pub temperature_msb: u8,
}

impl MsbRegister {
    pub const fn decode(raw: u32) -> Self {
        Self {
            x_msb: field(raw, 24, 8) as u8,
            y_msb: field(raw, 16, 8) as u8,
            z_msb: field(raw, 8, 8) as u8,
            new_data: field(raw, 7, 1) != 0,
            interrupt: field(raw, 6, 1) != 0,
            temperature_msb: field(raw, 0, 6) as u8,
        }
    }
}

/// Register 0x29.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsbRegister {
    pub interrupt_write: bool,
    pub x_lsb: u8,
    pub y_lsb: u8,
    pub z_lsb: u8,
    pub hall_status: u8,
    pub temperature_lsb: u8,
}

impl LsbRegister {
    pub const fn decode(raw: u32) -> Self {
        Self {
            interrupt_write: field(raw, 20, 1) != 0,
            x_lsb: field(raw, 16, 4) as u8,
            y_lsb: field(raw, 12, 4) as u8,
            z_lsb: field(raw, 8, 4) as u8,
            hall_status: field(raw, 6, 2) as u8,
            temperature_lsb: field(raw, 0, 6) as u8,
        }
    }
}

/// Register 0x02.  Only the address field is rewritten by the driver; the
/// other bits are passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepromRegister02(pub u32);

impl EepromRegister02 {
    const ADDR_SHIFT: u32 = 10;
    const ADDR_WIDTH: u32 = 7;
    const ADDR_MASK: u32 = ((1 << Self::ADDR_WIDTH) - 1) << Self::ADDR_SHIFT;

    pub const fn slave_address(self) -> u8 {
        field(self.0, Self::ADDR_SHIFT, Self::ADDR_WIDTH) as u8
    }

    pub const fn with_slave_address(self, addr: u8) -> Self {
        let cleared = self.0 & !Self::ADDR_MASK;
        Self(cleared | (((addr as u32) & 0x7F) << Self::ADDR_SHIFT))
    }
}

/// Reassemble one axis from its MSB and LSB halves.
///
/// The MSB byte forms the upper byte and the LSB nibble the low bits; the
/// 16-bit pattern is reinterpreted as signed.
#[inline]
pub const fn assemble_axis(msb: u8, lsb: u8) -> i16 {
    (((msb as u16) << 8) | (lsb as u16 & 0x0F)) as i16
}
