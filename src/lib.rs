//! Cannon node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]`.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;

pub mod adapters;
pub mod drivers;
pub mod sensors;
pub mod state;
pub mod telemetry;
