//! Application core: pure domain logic, zero I/O.
//!
//! The sampling pipeline (filters, state tracking, change view, publish
//! throttles) lives in [`service`].  All interaction with hardware and the
//! message transport happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
