//! Sensor drivers and the math that turns their readings into loop inputs.
//!
//! - [`als31300`] angle encoder driver (register map in [`als31300_regs`])
//! - [`vl6180x`] time-of-flight range finder driver
//! - [`heading`] circular arithmetic and the loop heading filter
//! - [`range`] range sample type and smoothing

pub mod als31300;
pub mod als31300_regs;
pub mod heading;
pub mod range;
pub mod vl6180x;
