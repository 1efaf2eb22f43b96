//! CLI configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use multicast_core::{CastConfig, CatalogConfig, DispatchConfig};
use serde::Deserialize;

/// Configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Receiver app launched for playback.
    /// Override: `MULTICAST_APP_ID`
    pub app_id: String,

    /// mDNS browse window in milliseconds.
    /// Override: `MULTICAST_DISCOVERY_TIMEOUT_MS`
    pub discovery_timeout_ms: u64,

    /// Connect and first-status timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long a queued load waits for the receiver app in milliseconds.
    pub launch_timeout_ms: u64,

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// yt-dlp executable.
    /// Override: `MULTICAST_YTDLP`
    pub ytdlp_program: String,

    /// yt-dlp format selector.
    /// Override: `MULTICAST_VIDEO_FORMAT`
    pub video_format: String,

    /// Newest entries considered per refresh.
    pub max_entries: usize,

    /// Parallel yt-dlp URL lookups.
    pub resolve_concurrency: usize,

    /// MIME type sent with every load.
    /// Override: `MULTICAST_CONTENT_TYPE` (via clap in main.rs)
    pub content_type: String,

    /// Skip a device that does not confirm playback within this many
    /// milliseconds. Unset waits forever.
    /// Override: `MULTICAST_CONFIRM_TIMEOUT_MS`
    pub confirm_timeout_ms: Option<u64>,

    /// Stop every selected device before the first round.
    pub reset_on_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let cast = CastConfig::default();
        let catalog = CatalogConfig::default();
        let dispatch = DispatchConfig::default();
        Self {
            app_id: cast.app_id,
            discovery_timeout_ms: cast.discovery_timeout_ms,
            connect_timeout_ms: cast.connect_timeout_ms,
            launch_timeout_ms: cast.launch_timeout_ms,
            heartbeat_interval_ms: cast.heartbeat_interval_ms,
            ytdlp_program: catalog.program,
            video_format: catalog.format,
            max_entries: catalog.max_entries,
            resolve_concurrency: catalog.resolve_concurrency,
            content_type: dispatch.content_type,
            confirm_timeout_ms: dispatch.confirm_timeout_ms,
            reset_on_start: dispatch.reset_on_start,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies `MULTICAST_*` overrides read through `var`.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("MULTICAST_APP_ID") {
            self.app_id = val;
        }

        if let Some(val) = var("MULTICAST_DISCOVERY_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.discovery_timeout_ms = ms;
            }
        }

        if let Some(val) = var("MULTICAST_YTDLP") {
            self.ytdlp_program = val;
        }

        if let Some(val) = var("MULTICAST_VIDEO_FORMAT") {
            self.video_format = val;
        }

        if let Some(val) = var("MULTICAST_CONFIRM_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.confirm_timeout_ms = Some(ms);
            }
        }

        // Note: MULTICAST_CONTENT_TYPE and MULTICAST_LOG_LEVEL are handled by
        // clap via #[arg(env = ...)] in main.rs
    }

    /// Converts to multicast-core's Config type.
    pub fn to_core_config(&self) -> multicast_core::Config {
        multicast_core::Config {
            cast: CastConfig {
                app_id: self.app_id.clone(),
                discovery_timeout_ms: self.discovery_timeout_ms,
                connect_timeout_ms: self.connect_timeout_ms,
                launch_timeout_ms: self.launch_timeout_ms,
                heartbeat_interval_ms: self.heartbeat_interval_ms,
                ..Default::default()
            },
            catalog: CatalogConfig {
                program: self.ytdlp_program.clone(),
                format: self.video_format.clone(),
                max_entries: self.max_entries,
                resolve_concurrency: self.resolve_concurrency,
                ..Default::default()
            },
            dispatch: DispatchConfig {
                content_type: self.content_type.clone(),
                confirm_timeout_ms: self.confirm_timeout_ms,
                reset_on_start: self.reset_on_start,
            },
        }
    }
}
