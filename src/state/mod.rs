//! Tracked node state: snapshot aggregation, record encoding and the
//! cannon-level change view.

pub mod controller;
pub mod encode;
pub mod view;

pub use controller::{ChangeMask, Snapshot, StateTracker};
pub use view::{ChangeView, SignalSource, ViewChanges};
