//! Per-device ready/active inference from status events.
//!
//! The tracker latches two flags:
//! - `ready`: the expected receiver app is running on the device
//! - `active`: playback was confirmed after the app became ready
//!
//! `active` only drops on an idle/unknown player state, and that drop is
//! what raises the shared [`AvailabilitySignal`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::cast::{PlayerState, StatusEvent};

use super::availability::AvailabilitySignal;

/// Snapshot of a tracker's flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    pub ready: bool,
    pub active: bool,
}

/// State machine behind one device.
///
/// Flags are published through a `watch` channel; the sender lives here,
/// so receivers observe a closed channel once the tracker is gone.
pub struct DeviceStatusTracker {
    name: String,
    expected_app_id: String,
    status: watch::Sender<DeviceStatus>,
    availability: Arc<AvailabilitySignal>,
}

impl DeviceStatusTracker {
    /// Creates a tracker; `ready` starts set when `running_app_id` is the
    /// expected app.
    pub fn new(
        name: impl Into<String>,
        expected_app_id: impl Into<String>,
        running_app_id: Option<&str>,
        availability: Arc<AvailabilitySignal>,
    ) -> (Self, watch::Receiver<DeviceStatus>) {
        let expected_app_id = expected_app_id.into();
        let initial = DeviceStatus {
            ready: running_app_id == Some(expected_app_id.as_str()),
            active: false,
        };
        let (status, receiver) = watch::channel(initial);
        (
            Self {
                name: name.into(),
                expected_app_id,
                status,
                availability,
            },
            receiver,
        )
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.status.borrow().ready
    }

    pub fn is_active(&self) -> bool {
        self.status.borrow().active
    }

    /// Applies an application status report.
    pub fn on_app_status(&self, running_app_id: Option<&str>) {
        let ready = running_app_id == Some(self.expected_app_id.as_str());
        self.status.send_if_modified(|status| {
            if status.ready == ready {
                return false;
            }
            status.ready = ready;
            true
        });
    }

    /// Applies a player status report.
    ///
    /// Returns true when this report freed the device and raised the
    /// availability signal.
    pub fn on_player_status(&self, state: PlayerState) -> bool {
        let mut freed = false;
        self.status.send_if_modified(|status| {
            if status.active {
                if state.is_idle() {
                    status.active = false;
                    freed = true;
                    return true;
                }
            } else if status.ready && state.is_playing() {
                status.active = true;
                return true;
            }
            false
        });

        if freed {
            log::debug!("[Tracker] {} is free ({:?})", self.name, state);
            self.availability.set();
        }
        freed
    }

    pub fn handle(&self, event: &StatusEvent) {
        match event {
            StatusEvent::App { app_id } => self.on_app_status(app_id.as_deref()),
            StatusEvent::Player { state } => {
                self.on_player_status(*state);
            }
        }
    }

    /// Consumes the device's inbox until the connection ends.
    pub async fn run(self, mut inbox: mpsc::Receiver<StatusEvent>) {
        while let Some(event) = inbox.recv().await {
            log::trace!("[Tracker] {} <- {:?}", self.name, event);
            self.handle(&event);
        }
        log::info!("[Tracker] {} event stream ended", self.name);
    }
}
