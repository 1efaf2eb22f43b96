//! Trait abstractions for Cast operations.
//!
//! These traits enable dependency injection for testability and modularity.
//! Services depend on traits rather than the concrete TLS client.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::cast::types::{CastEndpoint, CastResult, StatusEvent};

/// Commands issued to one connected device.
///
/// Both commands are fire-and-forget: they return once the request is on
/// the wire and never wait for the device to act on it. Confirmation
/// arrives separately through the session's status events.
#[async_trait]
pub trait CastControl: Send + Sync {
    /// Launches the media receiver if needed and loads `url` into it.
    async fn play_media(&self, url: &str, content_type: &str) -> CastResult<()>;

    /// Stops whatever application the device is running.
    async fn quit_app(&self) -> CastResult<()>;
}

/// A live connection to one device.
///
/// `events` is the device's inbox: every status change it reports is
/// pushed here in arrival order, and the channel closes when the
/// connection ends.
pub struct CastSession {
    /// The endpoint this session is connected to.
    pub endpoint: CastEndpoint,
    /// Command handle for the device.
    pub control: Arc<dyn CastControl>,
    /// Status events reported by the device.
    pub events: mpsc::Receiver<StatusEvent>,
    /// App ID running on the device when the session was established.
    pub running_app_id: Option<String>,
}

impl std::fmt::Debug for CastSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastSession")
            .field("endpoint", &self.endpoint)
            .field("running_app_id", &self.running_app_id)
            .finish_non_exhaustive()
    }
}

/// Trait for Cast device discovery.
#[async_trait]
pub trait CastDiscovery: Send + Sync {
    /// Discovers Cast receivers on the local network.
    async fn discover(&self) -> CastResult<Vec<CastEndpoint>>;
}

/// Trait for opening sessions to discovered devices.
#[async_trait]
pub trait CastConnector: Send + Sync {
    /// Connects to `endpoint` and waits for its first receiver status.
    async fn connect(&self, endpoint: &CastEndpoint) -> CastResult<CastSession>;
}

/// Combined trait for all Cast operations.
///
/// Used by bootstrap to hold one client for discovery and connections.
pub trait CastClient: CastDiscovery + CastConnector {}

/// Blanket implementation for any type implementing both traits.
impl<T: CastDiscovery + CastConnector> CastClient for T {}
