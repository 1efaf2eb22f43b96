//! Playback services.
//!
//! These sit between the Cast transport (`cast/`) and the catalog
//! (`catalog/`) and own all coordination state.
//!
//! - `availability` - "some device became free" signal
//! - `tracker` - per-device ready/active state machine
//! - `device` - a connected receiver plus its tracker
//! - `dispatcher` - the fetch/plan/play loop
//! - `selection` - filtering discovered receivers by name

pub mod availability;
pub mod device;
pub mod dispatcher;
pub mod selection;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use availability::AvailabilitySignal;
pub use device::{Device, DeviceState};
pub use dispatcher::{plan_assignments, Assignment, DeviceSnapshot, Dispatcher, RoundSummary};
pub use selection::select_devices;
pub use tracker::{DeviceStatus, DeviceStatusTracker};
