//! Game-facing cannon messages.
//!
//! | Topic                             | Payload     |
//! |-----------------------------------|-------------|
//! | `<base>/Cannon<id>/Hor`           | `pre_<deg>` |
//! | `<base>/Cannon<id>/Loaded`        | `triggered` |
//! | `<base>/Cannon<id>/Fired`         | `triggered` |
//!
//! None of these are retained and all go out at QoS 0.

use core::fmt::Write;

use heapless::String;

use super::topic::{Topic, publish_topic};
use crate::app::ports::MessagePublisher;
use crate::error::{EncodeError, Error, Result};
use crate::sensors::heading::quantize_deg;

pub const HEADING_LEAF: &str = "Hor";
pub const EVENT_PAYLOAD: &str = "triggered";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannonEvent {
    Loaded,
    Fired,
}

impl CannonEvent {
    pub const fn leaf(self) -> &'static str {
        match self {
            Self::Loaded => "Loaded",
            Self::Fired => "Fired",
        }
    }
}

pub struct CannonTelemetry {
    base: String<32>,
}

impl CannonTelemetry {
    pub fn new(base: &str) -> Self {
        let mut b = String::new();
        // Config validation bounds the base segment.
        let _ = b.push_str(base);
        Self { base: b }
    }

    fn topic(&self, unit_id: u8, leaf: &str) -> core::result::Result<Topic, EncodeError> {
        let mut unit: String<16> = String::new();
        write!(unit, "Cannon{unit_id}")?;
        publish_topic(&[self.base.as_str(), unit.as_str(), leaf])
    }

    /// Publish a heading as `pre_<deg>`, `deg` rounded into 0..=359.
    pub fn publish_heading(
        &self,
        client: &mut impl MessagePublisher,
        unit_id: u8,
        deg: f32,
    ) -> Result<()> {
        let topic = self.topic(unit_id, HEADING_LEAF)?;
        let mut payload: String<16> = String::new();
        write!(payload, "pre_{}", quantize_deg(deg)).map_err(EncodeError::from)?;
        if client.publish(&topic, &payload, false, 0) {
            Ok(())
        } else {
            Err(Error::Publish)
        }
    }

    pub fn publish_event(
        &self,
        client: &mut impl MessagePublisher,
        unit_id: u8,
        event: CannonEvent,
    ) -> Result<()> {
        let topic = self.topic(unit_id, event.leaf())?;
        if client.publish(&topic, EVENT_PAYLOAD, false, 0) {
            Ok(())
        } else {
            Err(Error::Publish)
        }
    }
}
