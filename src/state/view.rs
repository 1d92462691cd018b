//! Cannon-level view over the tracked state.
//!
//! Re-quantises the heading to whole degrees and turns the presence and
//! button levels into one-shot "loaded" and "fired" edges.

use core::ops::BitOr;

use super::controller::StateTracker;
use crate::sensors::heading::quantize_deg;

/// Signals the view reads each cycle.
pub trait SignalSource {
    fn heading_deg(&self) -> f32;
    /// A round is sitting in front of the range finder.
    fn loaded(&self) -> bool;
    /// The trigger is held.
    fn fired(&self) -> bool;
}

impl SignalSource for StateTracker {
    fn heading_deg(&self) -> f32 {
        self.current().heading_deg
    }

    fn loaded(&self) -> bool {
        self.current().target_present
    }

    fn fired(&self) -> bool {
        self.current().button_pressed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewChanges(u8);

impl ViewChanges {
    pub const NONE: Self = Self(0);
    pub const HEADING: Self = Self(1 << 0);
    pub const LOADED: Self = Self(1 << 1);
    pub const FIRED: Self = Self(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for ViewChanges {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Derived signals for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainSignals {
    /// 0..=359
    pub quantized_heading: u16,
    pub loaded_edge: bool,
    pub fired_edge: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeView {
    heading_deg: f32,
    signals: DomainSignals,
    loaded: bool,
    fired: bool,
}

impl ChangeView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per cycle, after the tracker has been updated.
    pub fn update(&mut self, src: &impl SignalSource) -> ViewChanges {
        let mut changed = ViewChanges::NONE;

        let raw = src.heading_deg();
        let q = quantize_deg(raw);
        if q != self.signals.quantized_heading {
            self.signals.quantized_heading = q;
            self.heading_deg = raw;
            changed = changed | ViewChanges::HEADING;
        }

        let loaded = src.loaded();
        self.signals.loaded_edge = loaded && !self.loaded;
        self.loaded = loaded;
        if self.signals.loaded_edge {
            changed = changed | ViewChanges::LOADED;
        }

        let fired = src.fired();
        self.signals.fired_edge = fired && !self.fired;
        self.fired = fired;
        if self.signals.fired_edge {
            changed = changed | ViewChanges::FIRED;
        }

        changed
    }

    /// Heading (float) at the last reported quantised change.
    pub fn heading_deg(&self) -> f32 {
        self.heading_deg
    }

    pub fn quantized_heading(&self) -> u16 {
        self.signals.quantized_heading
    }

    pub fn just_loaded(&self) -> bool {
        self.signals.loaded_edge
    }

    pub fn just_fired(&self) -> bool {
        self.signals.fired_edge
    }

    pub fn signals(&self) -> DomainSignals {
        self.signals
    }

    /// Clear the loaded/fired latches so a level that is still held
    /// produces a fresh edge on the next update.
    pub fn reset(&mut self) {
        self.loaded = false;
        self.fired = false;
        self.signals.loaded_edge = false;
        self.signals.fired_edge = false;
    }
}
