//! Compact JSON records for snapshots and deltas.
//!
//! ```text
//! full  {"t":12345,"ang":12.50,"btn":1,"dist":87,"prs":1}
//! delta {"t":12345,"ang":12.50,"btn":0}
//! ```
//!
//! Key order is fixed.  Both writers clear the caller's buffer first and
//! return the encoded length; on [`EncodeError::Overflow`] the buffer
//! holds a truncated prefix that must not be published.

use core::fmt::Write;

use heapless::String;
use serde::Deserialize;

use super::controller::{ChangeMask, Snapshot};
use crate::error::EncodeError;

/// Buffer size that fits any full snapshot.
pub const RECORD_CAP: usize = 96;

pub fn write_snapshot<const N: usize>(
    snap: &Snapshot,
    out: &mut String<N>,
) -> Result<usize, EncodeError> {
    out.clear();
    write!(
        out,
        "{{\"t\":{},\"ang\":{:.2},\"btn\":{},\"dist\":{},\"prs\":{}}}",
        snap.ts_ms,
        snap.heading_deg,
        u8::from(snap.button_pressed),
        snap.range_mm,
        u8::from(snap.target_present),
    )?;
    Ok(out.len())
}

/// Timestamp plus the fields flagged in `mask`.  A heartbeat-only mask
/// yields `{"t":..}`.
pub fn write_delta<const N: usize>(
    snap: &Snapshot,
    mask: ChangeMask,
    out: &mut String<N>,
) -> Result<usize, EncodeError> {
    out.clear();
    write!(out, "{{\"t\":{}", snap.ts_ms)?;
    if mask.contains(ChangeMask::HEADING) {
        write!(out, ",\"ang\":{:.2}", snap.heading_deg)?;
    }
    if mask.contains(ChangeMask::BUTTON) {
        write!(out, ",\"btn\":{}", u8::from(snap.button_pressed))?;
    }
    if mask.contains(ChangeMask::RANGE) {
        write!(out, ",\"dist\":{}", snap.range_mm)?;
    }
    if mask.contains(ChangeMask::PRESENCE) {
        write!(out, ",\"prs\":{}", u8::from(snap.target_present))?;
    }
    out.push('}').map_err(|_| EncodeError::Overflow)?;
    Ok(out.len())
}

/// Either record shape parsed back.  Absent fields are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SnapshotRecord {
    pub t: u32,
    #[serde(default)]
    pub ang: Option<f32>,
    #[serde(default)]
    pub btn: Option<u8>,
    #[serde(default)]
    pub dist: Option<u16>,
    #[serde(default)]
    pub prs: Option<u8>,
}

impl SnapshotRecord {
    pub fn parse(json: &str) -> Result<Self, EncodeError> {
        serde_json::from_str(json).map_err(|_| EncodeError::Malformed)
    }

    /// Fields present in the record, as a mask.
    pub fn fields(&self) -> ChangeMask {
        let mut m = ChangeMask::NONE;
        if self.ang.is_some() {
            m |= ChangeMask::HEADING;
        }
        if self.btn.is_some() {
            m |= ChangeMask::BUTTON;
        }
        if self.dist.is_some() {
            m |= ChangeMask::RANGE;
        }
        if self.prs.is_some() {
            m |= ChangeMask::PRESENCE;
        }
        m
    }
}
