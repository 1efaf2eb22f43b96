//! Runtime configuration for the multicast engine.
//!
//! All fields have sensible defaults; the binary layers a YAML file and
//! environment overrides on top.

use serde::{Deserialize, Serialize};

use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;

/// Cast client settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CastConfig {
    /// Receiver app whose presence marks a device as ready.
    pub app_id: String,

    /// mDNS browse window (milliseconds).
    pub discovery_timeout_ms: u64,

    /// TCP/TLS connect plus first receiver status (milliseconds).
    pub connect_timeout_ms: u64,

    /// How long a queued `LOAD` waits for the launched app (milliseconds).
    pub launch_timeout_ms: u64,

    /// Interval between heartbeat `PING`s (milliseconds).
    pub heartbeat_interval_ms: u64,

    /// Capacity of each device's status inbox.
    pub event_channel_capacity: usize,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_MEDIA_RECEIVER_APP_ID.to_string(),
            discovery_timeout_ms: 5000,
            connect_timeout_ms: 10_000,
            launch_timeout_ms: 20_000,
            heartbeat_interval_ms: 5000,
            event_channel_capacity: 64,
        }
    }
}

impl CastConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.app_id.trim().is_empty() {
            return Err("cast.app_id must not be empty".to_string());
        }
        if self.discovery_timeout_ms == 0 {
            return Err("cast.discovery_timeout_ms must be >= 1".to_string());
        }
        if self.heartbeat_interval_ms == 0 {
            return Err("cast.heartbeat_interval_ms must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "cast.event_channel_capacity must be >= 1 (mpsc::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }
}

/// yt-dlp catalog settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    /// yt-dlp executable (name on `PATH` or absolute path).
    pub program: String,

    /// Format selector passed to `-f` when resolving stream URLs.
    pub format: String,

    /// Entries listed per update (`--playlist-end`). Each uncached entry
    /// costs one yt-dlp run per update, so this bounds the first round.
    pub max_entries: usize,

    /// Stream URL resolutions running at once.
    pub resolve_concurrency: usize,

    /// How long a resolved stream URL is reused (seconds).
    pub url_ttl_secs: u64,

    /// Extractors accepted as a channel/user catalog.
    pub accepted_extractors: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            format: "best".to_string(),
            max_entries: 50,
            resolve_concurrency: 4,
            url_ttl_secs: 3 * 60 * 60,
            accepted_extractors: vec![
                "youtube:tab".to_string(),
                "youtube:channel".to_string(),
                "youtube:user".to_string(),
            ],
        }
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("catalog.program must not be empty".to_string());
        }
        if self.max_entries == 0 {
            return Err("catalog.max_entries must be >= 1".to_string());
        }
        if self.resolve_concurrency == 0 {
            return Err("catalog.resolve_concurrency must be >= 1".to_string());
        }
        if self.accepted_extractors.is_empty() {
            return Err("catalog.accepted_extractors must not be empty".to_string());
        }
        Ok(())
    }
}

/// Dispatcher settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DispatchConfig {
    /// MIME type sent with every `LOAD`.
    pub content_type: String,

    /// Give up waiting for playback confirmation after this long
    /// (milliseconds). `None` waits indefinitely.
    pub confirm_timeout_ms: Option<u64>,

    /// Stop every selected device before the first round.
    pub reset_on_start: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            content_type: "video/mp4".to_string(),
            confirm_timeout_ms: None,
            reset_on_start: true,
        }
    }
}

/// Configuration for the multicast engine.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub cast: CastConfig,
    pub catalog: CatalogConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Validates every section.
    pub fn validate(&self) -> Result<(), String> {
        self.cast.validate()?;
        self.catalog.validate()?;
        if self.dispatch.content_type.trim().is_empty() {
            return Err("dispatch.content_type must not be empty".to_string());
        }
        if self.dispatch.confirm_timeout_ms == Some(0) {
            return Err("dispatch.confirm_timeout_ms must be >= 1 when set".to_string());
        }
        Ok(())
    }
}
