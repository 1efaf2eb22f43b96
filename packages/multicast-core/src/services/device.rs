//! One connected Cast receiver in the playback pool.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::cast::{CastControl, CastEndpoint, CastError, CastResult, CastSession};
use crate::catalog::Item;
use crate::config::DispatchConfig;

use super::availability::AvailabilitySignal;
use super::tracker::{DeviceStatus, DeviceStatusTracker};

/// Coarse device state derived from the tracker flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceState {
    /// The device's event path has ended.
    Disconnected,
    /// Connected, but the expected app is not running.
    Connecting,
    /// The expected app is running; nothing confirmed playing.
    Ready,
    /// Confirmed playing an item.
    Active,
}

/// A device with its status tracker.
///
/// `current_item_id` is set on every [`play`](Self::play) and is left in
/// place when the device goes idle; it only means something while the
/// device is [`DeviceState::Active`].
pub struct Device {
    endpoint: CastEndpoint,
    control: Arc<dyn CastControl>,
    status: watch::Receiver<DeviceStatus>,
    current_item_id: Mutex<Option<String>>,
    content_type: String,
    confirm_timeout_ms: Option<u64>,
    tracker_task: JoinHandle<()>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.endpoint.name)
            .field("state", &self.state())
            .field("current_item_id", &*self.current_item_id.lock())
            .finish()
    }
}

impl Device {
    /// Wraps a connected session and starts its tracker task.
    pub fn new(
        session: CastSession,
        expected_app_id: &str,
        availability: Arc<AvailabilitySignal>,
        dispatch: &DispatchConfig,
    ) -> Self {
        let CastSession {
            endpoint,
            control,
            events,
            running_app_id,
        } = session;

        let (tracker, status) = DeviceStatusTracker::new(
            endpoint.name.clone(),
            expected_app_id,
            running_app_id.as_deref(),
            availability,
        );
        let tracker_task = tokio::spawn(tracker.run(events));

        Self {
            endpoint,
            control,
            status,
            current_item_id: Mutex::new(None),
            content_type: dispatch.content_type.clone(),
            confirm_timeout_ms: dispatch.confirm_timeout_ms,
            tracker_task,
        }
    }

    pub fn name(&self) -> &str {
        &self.endpoint.name
    }

    pub fn endpoint(&self) -> &CastEndpoint {
        &self.endpoint
    }

    pub fn is_active(&self) -> bool {
        self.status.borrow().active
    }

    pub fn is_ready(&self) -> bool {
        self.status.borrow().ready
    }

    /// False once the tracker has stopped (connection closed).
    pub fn is_connected(&self) -> bool {
        self.status.has_changed().is_ok()
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> DeviceState {
        if !self.is_connected() {
            return DeviceState::Disconnected;
        }
        match self.status() {
            DeviceStatus { active: true, .. } => DeviceState::Active,
            DeviceStatus { ready: true, .. } => DeviceState::Ready,
            _ => DeviceState::Connecting,
        }
    }

    pub fn current_item_id(&self) -> Option<String> {
        self.current_item_id.lock().clone()
    }

    /// Starts `item` and waits until the device reports it playing.
    ///
    /// # Errors
    ///
    /// - [`CastError::ConfirmationTimeout`] when a confirmation timeout is
    ///   configured and expires
    /// - [`CastError::Disconnected`] when the event path ends first
    /// - any error sending the play command
    pub async fn play(&self, item: &Item) -> CastResult<()> {
        *self.current_item_id.lock() = Some(item.id.clone());
        log::info!("[Device] {} <- {}", self.endpoint.name, item.id);

        self.control.play_media(&item.url, &self.content_type).await?;

        let mut status = self.status.clone();
        let confirmed = async move {
            status
                .wait_for(|s| s.ready && s.active)
                .await
                .map(|_| ())
                .map_err(|_| CastError::Disconnected(self.endpoint.name.clone()))
        };

        match self.confirm_timeout_ms {
            Some(ms) => match timeout(Duration::from_millis(ms), confirmed).await {
                Ok(result) => result,
                Err(_) => Err(CastError::ConfirmationTimeout(
                    self.endpoint.name.clone(),
                    ms,
                )),
            },
            None => confirmed.await,
        }
    }

    /// Asks the device to quit its app; does not wait for it.
    pub async fn stop(&self) -> CastResult<()> {
        log::debug!("[Device] Stopping {}", self.endpoint.name);
        self.control.quit_app().await
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.tracker_task.abort();
    }
}
