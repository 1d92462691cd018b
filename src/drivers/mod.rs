//! Bus transport, stuck-bus recovery, and the trigger button.

pub mod bus_recovery;
pub mod button;
pub mod i2c_bus;
