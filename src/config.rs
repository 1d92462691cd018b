//! Node configuration parameters
//!
//! All tunable parameters for a cannon node.  Defaults match the field
//! deployment; override `unit_id` per cannon.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Fixed capacity for topic segments held in the config.
pub const TOPIC_SEGMENT_CAP: usize = 32;

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Identity / topics ---
    /// Cannon number, used in topics (`<base>/Cannon<id>/...`).
    pub unit_id: u8,
    /// Root topic level.
    pub base_topic: String<TOPIC_SEGMENT_CAP>,
    /// Leaf for retained full snapshots.
    pub state_event: String<TOPIC_SEGMENT_CAP>,
    /// Leaf for delta records.
    pub delta_event: String<TOPIC_SEGMENT_CAP>,
    /// Publish full snapshots with the retain flag.
    pub retain_state: bool,
    /// MQTT QoS for every publish (0 or 1).
    pub qos: u8,

    // --- Bus ---
    pub i2c_sda_gpio: i32,
    pub i2c_scl_gpio: i32,
    /// Bus clock in Hz.
    pub i2c_clock_hz: u32,
    /// Per-transaction timeout in milliseconds.
    pub i2c_timeout_ms: u16,
    /// Angle sensor address used when the scan finds nothing.
    pub angle_fallback_addr: u8,

    // --- Button ---
    pub button_gpio: i32,
    /// Button pulls the line to ground when pressed.
    pub button_active_low: bool,
    /// Debounce window (milliseconds)
    pub button_debounce_ms: u16,

    // --- Change detection ---
    /// Aggregator heading epsilon (degrees).
    pub angle_epsilon_deg: f32,
    /// Range at or below which a target counts as present (0 disables).
    pub presence_threshold_mm: u16,
    /// Time-only heartbeat interval (0 disables).
    pub heartbeat_ms: u32,

    // --- Publish throttles ---
    /// Minimum integer heading move before a heading publish.
    pub min_heading_delta_deg: u16,
    /// Minimum range move before a range log line.
    pub min_range_delta_mm: u16,

    // --- Loop filters ---
    pub range_filter_alpha: f32,
    pub heading_filter_alpha: f32,
    /// Heading moves at or above this are rejected as glitches.
    pub max_heading_jump_deg: f32,
    /// Share of each new reading in the angle sensor's slow heading stage
    /// (1.0 passes the axis heading straight through).
    pub angle_heading_weight: f32,

    // --- Timing ---
    pub status_interval_ms: u32,
    pub loop_interval_ms: u32,
    pub startup_settle_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            unit_id: 2,
            base_topic: segment("MermaidsTale"),
            state_event: segment("state"),
            delta_event: segment("changes"),
            retain_state: true,
            qos: 0,

            i2c_sda_gpio: 15,
            i2c_scl_gpio: 18,
            i2c_clock_hz: 100_000,
            i2c_timeout_ms: 50,
            angle_fallback_addr: 0x65,

            button_gpio: 35,
            button_active_low: true,
            button_debounce_ms: 20,

            angle_epsilon_deg: 0.25,
            presence_threshold_mm: 120,
            heartbeat_ms: 2000,

            min_heading_delta_deg: 1,
            min_range_delta_mm: 2,

            range_filter_alpha: 0.2,
            heading_filter_alpha: 0.3,
            max_heading_jump_deg: 10.0,
            angle_heading_weight: 1.0,

            status_interval_ms: 5000,
            loop_interval_ms: 50,
            startup_settle_ms: 1000,
        }
    }
}

impl NodeConfig {
    /// Reject values that would break the sampling loop or the topic layout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_topic.is_empty() {
            return Err(ConfigError::Invalid("base_topic must not be empty"));
        }
        for seg in [&self.base_topic, &self.state_event, &self.delta_event] {
            if seg.contains(['+', '#']) {
                return Err(ConfigError::Invalid("topic segments must not contain wildcards"));
            }
        }
        for leaf in [&self.state_event, &self.delta_event] {
            if leaf.is_empty() || leaf.contains('/') {
                return Err(ConfigError::Invalid("event leaves must be one non-empty level"));
            }
        }
        if self.qos > 1 {
            return Err(ConfigError::Invalid("qos must be 0 or 1"));
        }
        if self.i2c_clock_hz == 0 || self.i2c_clock_hz > 1_000_000 {
            return Err(ConfigError::Invalid("i2c_clock_hz out of range"));
        }
        if self.angle_fallback_addr > 0x7F {
            return Err(ConfigError::Invalid("angle_fallback_addr is not a 7-bit address"));
        }
        if !(self.angle_epsilon_deg >= 0.0 && self.angle_epsilon_deg < 180.0) {
            return Err(ConfigError::Invalid("angle_epsilon_deg out of range"));
        }
        for alpha in [
            self.range_filter_alpha,
            self.heading_filter_alpha,
            self.angle_heading_weight,
        ] {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::Invalid("filter alpha and heading weight must be in (0, 1]"));
            }
        }
        if !(self.max_heading_jump_deg > 0.0 && self.max_heading_jump_deg <= 180.0) {
            return Err(ConfigError::Invalid("max_heading_jump_deg out of range"));
        }
        if self.loop_interval_ms == 0 {
            return Err(ConfigError::Invalid("loop_interval_ms must be > 0"));
        }
        Ok(())
    }

    /// Per-unit topic root, e.g. `MermaidsTale/Cannon2`.
    pub fn unit_base(&self) -> String<64> {
        let mut out = String::new();
        // Capacity covers TOPIC_SEGMENT_CAP + "/Cannon" + three digits.
        let _ = core::fmt::Write::write_fmt(
            &mut out,
            format_args!("{}/Cannon{}", self.base_topic, self.unit_id),
        );
        out
    }
}

fn segment(s: &str) -> String<TOPIC_SEGMENT_CAP> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}
