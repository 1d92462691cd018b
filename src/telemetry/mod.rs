//! Outbound telemetry: topic helpers, state records and cannon messages.

pub mod cannon;
pub mod publisher;
pub mod topic;

pub use cannon::{CannonEvent, CannonTelemetry};
pub use publisher::{StatePublisher, TelemetryPolicy};
