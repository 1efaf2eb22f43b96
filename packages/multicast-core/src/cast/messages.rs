//! JSON payloads exchanged over the Cast namespaces.
//!
//! Outgoing requests are a single tagged enum; incoming messages are parsed
//! into [`Inbound`], with anything unrecognized mapped to
//! [`Inbound::Other`] so new device firmware cannot break the reader.

use serde::{Deserialize, Serialize};

use crate::cast::types::PlayerState;

/// Requests sent to a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Opens a virtual connection (connection namespace).
    Connect,
    /// Closes a virtual connection (connection namespace).
    Close,
    /// Keep-alive probe (heartbeat namespace).
    Ping,
    /// Keep-alive answer (heartbeat namespace).
    Pong,
    /// Asks for a `RECEIVER_STATUS` or `MEDIA_STATUS`.
    #[serde(rename_all = "camelCase")]
    GetStatus { request_id: i64 },
    /// Starts an application (receiver namespace).
    #[serde(rename_all = "camelCase")]
    Launch { request_id: i64, app_id: String },
    /// Stops an application (receiver namespace).
    #[serde(rename_all = "camelCase")]
    Stop {
        request_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    /// Loads media into a running receiver app (media namespace).
    #[serde(rename_all = "camelCase")]
    Load {
        request_id: i64,
        session_id: String,
        media: MediaInformation,
        autoplay: bool,
        current_time: f64,
    },
}

impl Request {
    /// Serializes the request to its JSON payload.
    pub fn to_payload(&self) -> String {
        // Serializing these plain structs cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Media description carried by `LOAD`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInformation {
    pub content_id: String,
    pub content_type: String,
    pub stream_type: StreamType,
}

impl MediaInformation {
    pub fn buffered(url: &str, content_type: &str) -> Self {
        Self {
            content_id: url.to_string(),
            content_type: content_type.to_string(),
            stream_type: StreamType::Buffered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    Buffered,
    Live,
}

/// Messages received from a device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Inbound {
    Ping,
    Pong,
    Close,
    ReceiverStatus {
        status: ReceiverStatus,
    },
    MediaStatus {
        #[serde(default)]
        status: Vec<MediaStatusEntry>,
    },
    LaunchError {
        #[serde(default)]
        reason: Option<String>,
    },
    LoadFailed,
    LoadCancelled,
    InvalidRequest {
        #[serde(default)]
        reason: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl Inbound {
    /// Parses a JSON payload, returning `None` for non-JSON garbage.
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

/// Body of `RECEIVER_STATUS`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
}

impl ReceiverStatus {
    /// The foreground application, if any.
    pub fn running_app(&self) -> Option<&Application> {
        self.applications.first()
    }
}

/// An application entry in `RECEIVER_STATUS`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub transport_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One entry of `MEDIA_STATUS`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatusEntry {
    #[serde(default)]
    pub media_session_id: i64,
    #[serde(default)]
    pub player_state: PlayerState,
    #[serde(default)]
    pub idle_reason: Option<String>,
}
