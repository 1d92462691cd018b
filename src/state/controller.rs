//! Change-tracked controller state.
//!
//! [`StateTracker`] keeps the current and previous [`Snapshot`] and reports
//! what moved between them as a [`ChangeMask`].  Heading changes are
//! measured against the last *reported* heading rather than the previous
//! sample, so a slow drift below epsilon per step still gets reported once
//! it accumulates.

use core::ops::{BitOr, BitOrAssign};

use crate::config::NodeConfig;
use crate::sensors::heading::{normalize_deg, shortest_distance};

pub const DEFAULT_ANGLE_EPSILON_DEG: f32 = 0.25;
pub const DEFAULT_PRESENCE_THRESHOLD_MM: u16 = 120;
pub const DEFAULT_HEARTBEAT_MS: u32 = 2000;

/// One timestamped set of readings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub ts_ms: u32,
    pub heading_deg: f32,
    pub button_pressed: bool,
    pub range_mm: u16,
    pub target_present: bool,
}

/// What changed in the last [`StateTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ChangeMask(u8);

impl ChangeMask {
    pub const NONE: Self = Self(0);
    pub const HEADING: Self = Self(1 << 0);
    pub const BUTTON: Self = Self(1 << 1);
    pub const RANGE: Self = Self(1 << 2);
    pub const PRESENCE: Self = Self(1 << 3);
    /// Time advanced, data unchanged.
    pub const HEARTBEAT: Self = Self(1 << 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x1F)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for ChangeMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Debug, Clone)]
pub struct StateTracker {
    current: Snapshot,
    previous: Snapshot,
    /// Heading at the last update that set [`ChangeMask::HEADING`].
    heading_baseline: Option<f32>,
    last_heartbeat_ms: u32,
    last_mask: ChangeMask,
    angle_epsilon_deg: f32,
    presence_threshold_mm: u16,
    heartbeat_ms: u32,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: Snapshot::default(),
            previous: Snapshot::default(),
            heading_baseline: None,
            last_heartbeat_ms: 0,
            last_mask: ChangeMask::NONE,
            angle_epsilon_deg: DEFAULT_ANGLE_EPSILON_DEG,
            presence_threshold_mm: DEFAULT_PRESENCE_THRESHOLD_MM,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
        }
    }

    pub fn from_config(cfg: &NodeConfig) -> Self {
        let mut s = Self::new();
        s.set_angle_epsilon(cfg.angle_epsilon_deg);
        s.set_presence_threshold_mm(cfg.presence_threshold_mm);
        s.set_heartbeat_ms(cfg.heartbeat_ms);
        s
    }

    pub fn set_angle_epsilon(&mut self, deg: f32) {
        self.angle_epsilon_deg = deg;
    }

    /// 0 disables the distance fallback for presence.
    pub fn set_presence_threshold_mm(&mut self, mm: u16) {
        self.presence_threshold_mm = mm;
    }

    /// 0 disables the heartbeat.
    pub fn set_heartbeat_ms(&mut self, ms: u32) {
        self.heartbeat_ms = ms;
    }

    /// Fold in one set of readings and return what changed.
    ///
    /// The first call only seeds the heading baseline; heading changes are
    /// reported from the second call on.
    pub fn update(
        &mut self,
        ts_ms: u32,
        heading_deg: f32,
        button_pressed: bool,
        range_mm: u16,
        range_valid: bool,
    ) -> ChangeMask {
        self.previous = self.current;
        let target_present = range_valid
            || (self.presence_threshold_mm > 0
                && range_mm > 0
                && range_mm <= self.presence_threshold_mm);
        self.current = Snapshot {
            ts_ms,
            heading_deg: normalize_deg(heading_deg),
            button_pressed,
            range_mm,
            target_present,
        };

        let mut mask = ChangeMask::NONE;
        let heading = self.current.heading_deg;
        match self.heading_baseline {
            None => self.heading_baseline = Some(heading),
            Some(base) if shortest_distance(base, heading).abs() > self.angle_epsilon_deg => {
                self.heading_baseline = Some(heading);
                mask |= ChangeMask::HEADING;
            }
            Some(_) => {}
        }
        if self.current.button_pressed != self.previous.button_pressed {
            mask |= ChangeMask::BUTTON;
        }
        if self.current.range_mm != self.previous.range_mm {
            mask |= ChangeMask::RANGE;
        }
        if self.current.target_present != self.previous.target_present {
            mask |= ChangeMask::PRESENCE;
        }

        if mask.is_empty()
            && self.heartbeat_ms > 0
            && ts_ms.wrapping_sub(self.last_heartbeat_ms) >= self.heartbeat_ms
        {
            self.last_heartbeat_ms = ts_ms;
            mask |= ChangeMask::HEARTBEAT;
        }

        self.last_mask = mask;
        mask
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    pub fn previous(&self) -> &Snapshot {
        &self.previous
    }

    pub fn last_change_mask(&self) -> ChangeMask {
        self.last_mask
    }
}
