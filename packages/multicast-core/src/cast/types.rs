//! Domain types shared by the Cast client and the playback services.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while discovering or talking to Cast devices.
#[derive(Debug, Error)]
pub enum CastError {
    /// mDNS daemon could not be started or browsed.
    #[error("mDNS daemon error: {0}")]
    Mdns(String),

    /// TCP connection to the device failed.
    #[error("failed to connect to {name}: {source}")]
    Connect {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS handshake with the device failed.
    #[error("TLS handshake with {0} failed: {1}")]
    Tls(String, String),

    /// The device did not answer within the configured time.
    #[error("{0} did not respond within {1}ms")]
    Timeout(String, u64),

    /// Writing a frame to the device failed.
    #[error("failed to send to {0}: {1}")]
    Send(String, String),

    /// The device's event stream ended.
    #[error("connection to {0} closed")]
    Disconnected(String),

    /// Playback did not start within the configured confirmation timeout.
    #[error("{0} did not confirm playback within {1}ms")]
    ConfirmationTimeout(String, u64),

    /// A frame could not be decoded.
    #[error("malformed cast frame: {0}")]
    Frame(String),

    /// Socket-level failure on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result alias for Cast operations.
pub type CastResult<T> = Result<T, CastError>;

// ─────────────────────────────────────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// A discovered Cast receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CastEndpoint {
    /// Friendly name shown in the Google Home app.
    pub name: String,
    /// IP address of the control channel.
    pub host: String,
    /// TCP port of the control channel.
    pub port: u16,
    /// Device UUID from the TXT `id` record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Model name from the TXT `md` record (e.g. "Chromecast Ultra").
    #[serde(rename = "modelName", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CastEndpoint {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            uuid: None,
            model: None,
        }
    }

    /// `host:port` of the control channel.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for CastEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.name, self.address())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status events
// ─────────────────────────────────────────────────────────────────────────────

/// Media player state as reported in `MEDIA_STATUS` messages.
///
/// Unrecognized states deserialize to [`PlayerState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
    Loading,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PlayerState {
    /// States meaning nothing is playing any more.
    #[must_use]
    pub fn is_idle(self) -> bool {
        matches!(self, Self::Unknown | Self::Idle)
    }

    /// States confirming that playback started.
    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Buffering | Self::Playing)
    }
}

/// A status change pushed from a device's event path to its tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// The application running on the device (`None` = backdrop).
    App { app_id: Option<String> },
    /// The media player state of the running application.
    Player { state: PlayerState },
}

impl StatusEvent {
    pub fn app(app_id: impl Into<String>) -> Self {
        Self::App {
            app_id: Some(app_id.into()),
        }
    }

    pub fn no_app() -> Self {
        Self::App { app_id: None }
    }

    pub fn player(state: PlayerState) -> Self {
        Self::Player { state }
    }
}
