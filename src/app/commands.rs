//! Inbound commands to the node service.
//!
//! Commands arrive as MQTT messages on the unit's own topics:
//!
//! | Topic            | Payload   | Command         |
//! |------------------|-----------|-----------------|
//! | `<unit>/reset`   | `true`    | `ResetSensors`  |
//! | `<unit>/status`  | `request` | `StatusRequest` |

/// Leaf of the reset command topic.
pub const RESET_LEAF: &str = "reset";
/// Leaf of the status topic; also where the retained status is published.
pub const STATUS_LEAF: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Re-detect both sensors and report the result.
    ResetSensors,
    /// Publish status and diagnostics now.
    StatusRequest,
}

impl NodeCommand {
    /// Map an inbound message to a command.  Anything else, including this
    /// node's own retained status messages, is ignored.
    pub fn parse(topic: &str, payload: &[u8], unit_base: &str) -> Option<Self> {
        let leaf = topic.strip_prefix(unit_base)?.strip_prefix('/')?;
        let payload = core::str::from_utf8(payload).ok()?.trim();
        match (leaf, payload) {
            (RESET_LEAF, "true") => Some(Self::ResetSensors),
            (STATUS_LEAF, "request") => Some(Self::StatusRequest),
            _ => None,
        }
    }

    /// Topic leaves the node subscribes to.
    pub const SUBSCRIPTIONS: [&'static str; 2] = [RESET_LEAF, STATUS_LEAF];
}
