//! State records on the wire, and the throttles that decide when the
//! cannon messages are worth sending.

use heapless::String;

use super::topic::{Topic, publish_topic};
use crate::app::ports::MessagePublisher;
use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::sensors::heading::integer_distance;
use crate::state::StateTracker;
use crate::state::encode::{RECORD_CAP, write_delta, write_snapshot};

// ───────────────────────────────────────────────────────────────
// StatePublisher
// ───────────────────────────────────────────────────────────────

/// Publishes full snapshots to `<base>/<state_event>` and deltas to
/// `<base>/<delta_event>`.
pub struct StatePublisher {
    state_topic: Topic,
    delta_topic: Topic,
    retain_state: bool,
    qos: u8,
}

impl StatePublisher {
    pub fn new(cfg: &NodeConfig) -> Result<Self> {
        let base = cfg.unit_base();
        Ok(Self {
            state_topic: publish_topic(&[base.as_str(), cfg.state_event.as_str()])?,
            delta_topic: publish_topic(&[base.as_str(), cfg.delta_event.as_str()])?,
            retain_state: cfg.retain_state,
            qos: cfg.qos,
        })
    }

    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    pub fn delta_topic(&self) -> &str {
        &self.delta_topic
    }

    pub fn publish_snapshot(
        &self,
        tracker: &StateTracker,
        client: &mut impl MessagePublisher,
    ) -> Result<()> {
        let mut payload: String<RECORD_CAP> = String::new();
        write_snapshot(tracker.current(), &mut payload)?;
        if client.publish(&self.state_topic, &payload, self.retain_state, self.qos) {
            Ok(())
        } else {
            Err(Error::Publish)
        }
    }

    /// Publish the fields flagged by the tracker's last update.
    /// `Ok(false)` when nothing changed.
    pub fn publish_deltas(
        &self,
        tracker: &StateTracker,
        client: &mut impl MessagePublisher,
    ) -> Result<bool> {
        let mask = tracker.last_change_mask();
        if mask.is_empty() {
            return Ok(false);
        }
        let mut payload: String<RECORD_CAP> = String::new();
        write_delta(tracker.current(), mask, &mut payload)?;
        if client.publish(&self.delta_topic, &payload, false, self.qos) {
            Ok(true)
        } else {
            Err(Error::Publish)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// TelemetryPolicy
// ───────────────────────────────────────────────────────────────

/// Publish-side throttles, independent of the tracker's epsilon.
///
/// Each `*_due` call that answers `true` moves the tracked value, whether
/// or not the caller's publish then succeeds.  Stale readings are never
/// retried.
#[derive(Debug, Clone)]
pub struct TelemetryPolicy {
    min_heading_delta_deg: u16,
    min_range_delta_mm: u16,
    last_heading: Option<u16>,
    last_range: Option<u16>,
}

impl TelemetryPolicy {
    pub fn new(min_heading_delta_deg: u16, min_range_delta_mm: u16) -> Self {
        Self {
            min_heading_delta_deg,
            min_range_delta_mm,
            last_heading: None,
            last_range: None,
        }
    }

    pub fn from_config(cfg: &NodeConfig) -> Self {
        Self::new(cfg.min_heading_delta_deg, cfg.min_range_delta_mm)
    }

    /// True if `deg` is far enough (around the circle) from the last
    /// published heading.
    pub fn heading_due(&mut self, deg: u16) -> bool {
        let due = self
            .last_heading
            .is_none_or(|last| integer_distance(last, deg) >= self.min_heading_delta_deg);
        if due {
            self.last_heading = Some(deg % 360);
        }
        due
    }

    /// True if `mm` moved far enough from the last reported range.
    pub fn range_due(&mut self, mm: u16) -> bool {
        let due = self
            .last_range
            .is_none_or(|last| last.abs_diff(mm) >= self.min_range_delta_mm);
        if due {
            self.last_range = Some(mm);
        }
        due
    }

    pub fn last_heading(&self) -> Option<u16> {
        self.last_heading
    }

    pub fn last_range(&self) -> Option<u16> {
        self.last_range
    }
}
