//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use super::ports::SensorHealth;
use crate::telemetry::cannon::CannonEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Angle,
    Range,
}

/// Multi-message publishes the node makes outside the game topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Scan,
    SensorReset,
    Status,
    Snapshot,
}

impl Report {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::SensorReset => "sensor reset",
            Self::Status => "status",
            Self::Snapshot => "snapshot",
        }
    }
}

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// Startup finished (carries the sensors that came up).
    Started(SensorHealth),

    /// Boot-time bus recovery result.
    BusRecovered { freed: bool },

    /// Bus scan result.
    BusScanned { devices: usize, angle_found: bool },

    /// A sensor went from readable to failing or back.
    SensorStatus { sensor: SensorKind, ok: bool, code: u8 },

    /// Heading handed to the publisher.
    HeadingPublished { deg: u16, ok: bool },

    /// Range moved by at least the reporting threshold.
    RangeMoved { mm: u16 },

    /// Debounced trigger level changed.
    Button { pressed: bool },

    /// Loaded or fired edge published.
    Cannon { event: CannonEvent, ok: bool },

    /// Sensors were reinitialised on request.
    SensorsReset(SensorHealth),

    /// A report or the full state record was handed to the publisher.
    /// `ok` is false if any of its messages was refused.
    Reported { report: Report, ok: bool },

    /// Periodic one-line status.
    Status(StatusLine),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusLine {
    pub health: SensorHealth,
    pub connected: bool,
    pub heading_deg: f32,
    pub range_mm: u16,
}
