//! Polled, software-debounced trigger button.
//!
//! ## Hardware
//!
//! Momentary switch on a GPIO input.  The cannon trigger is wired
//! active-low with the internal pull-up; polarity is configurable.
//!
//! ## Debounce
//!
//! Every raw change restarts the settling window.  A new stable level is
//! committed only after the raw level has held for `debounce_ms` and
//! differs from the current stable level, so glitches faster than the
//! window never produce an edge.
//!
//! | Raw input                         | Result            |
//! |-----------------------------------|-------------------|
//! | toggles faster than the window    | no edge           |
//! | single change held >= window      | exactly one edge  |

use embedded_hal::digital::InputPin;

/// Default settling window.
pub const DEFAULT_DEBOUNCE_MS: u16 = 30;

/// Which electrical level means "pressed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    High,
    Low,
}

/// Pure debounce state machine over a logical level.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    debounce_ms: u16,
    last_raw: bool,
    stable: bool,
    prev_stable: bool,
    last_change_ms: u32,
}

impl Debouncer {
    pub fn new(debounce_ms: u16) -> Self {
        Self {
            debounce_ms,
            last_raw: false,
            stable: false,
            prev_stable: false,
            last_change_ms: 0,
        }
    }

    /// Seed every level from the first reading so boot is edge-free.
    pub fn begin(&mut self, level: bool, now_ms: u32) {
        self.last_raw = level;
        self.stable = level;
        self.prev_stable = level;
        self.last_change_ms = now_ms;
    }

    /// Feed one raw sample.  Returns `true` once per committed edge.
    pub fn update(&mut self, raw: bool, now_ms: u32) -> bool {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_ms = now_ms;
        }

        let settled = now_ms.wrapping_sub(self.last_change_ms) >= u32::from(self.debounce_ms);
        if settled && raw != self.stable {
            self.prev_stable = self.stable;
            self.stable = raw;
            return true;
        }
        false
    }

    /// Current debounced level.
    pub fn stable(&self) -> bool {
        self.stable
    }

    /// Valid only immediately after `update` returned `true`.
    pub fn rose(&self) -> bool {
        !self.prev_stable && self.stable
    }

    /// Valid only immediately after `update` returned `true`.
    pub fn fell(&self) -> bool {
        self.prev_stable && !self.stable
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

/// Debounced view over an input pin.
pub struct DebouncedButton<P> {
    pin: P,
    active: ActiveLevel,
    state: Debouncer,
}

impl<P: InputPin> DebouncedButton<P> {
    pub fn new(pin: P, active: ActiveLevel, debounce_ms: u16) -> Self {
        Self {
            pin,
            active,
            state: Debouncer::new(debounce_ms),
        }
    }

    /// Logical reading (honours polarity).  A pin error reads as released.
    fn read(&mut self) -> bool {
        let high = match self.pin.is_high() {
            Ok(h) => h,
            Err(_) => return false,
        };
        match self.active {
            ActiveLevel::High => high,
            ActiveLevel::Low => !high,
        }
    }

    pub fn begin(&mut self, now_ms: u32) {
        let level = self.read();
        self.state.begin(level, now_ms);
    }

    /// Call every loop.  Returns `true` if a clean edge was committed.
    pub fn update(&mut self, now_ms: u32) -> bool {
        let level = self.read();
        self.state.update(level, now_ms)
    }

    pub fn pressed(&self) -> bool {
        self.state.stable()
    }

    pub fn rose(&self) -> bool {
        self.state.rose()
    }

    pub fn fell(&self) -> bool {
        self.state.fell()
    }
}
