//! Dispatcher activity events.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the dispatcher to report what it does
//! - [`DispatchEvent`] describing each step of an assignment round

mod emitter;

pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use serde::Serialize;

/// Events emitted by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DispatchEvent {
    /// A fresh batch was fetched from the catalog.
    #[serde(rename_all = "camelCase")]
    BatchFetched {
        /// Entries the source listed.
        entry_count: usize,
        /// Entries with a playable URL.
        playable: usize,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// An item was handed to a device.
    #[serde(rename_all = "camelCase")]
    PlaybackRequested {
        device: String,
        item_id: String,
        timestamp: u64,
    },
    /// The device confirmed it is playing the item.
    #[serde(rename_all = "camelCase")]
    PlaybackConfirmed {
        device: String,
        item_id: String,
        timestamp: u64,
    },
    /// The device failed to confirm and is skipped for this round.
    #[serde(rename_all = "camelCase")]
    DeviceSkipped {
        device: String,
        item_id: String,
        reason: String,
        timestamp: u64,
    },
    /// Every device is playing; the dispatcher sleeps until one frees up.
    #[serde(rename_all = "camelCase")]
    AllDevicesBusy { device_count: usize, timestamp: u64 },
    /// Shutdown requested; every device is being stopped.
    #[serde(rename_all = "camelCase")]
    StoppingAll { device_count: usize, timestamp: u64 },
}

impl DispatchEvent {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BatchFetched { .. } => "batch_fetched",
            Self::PlaybackRequested { .. } => "playback_requested",
            Self::PlaybackConfirmed { .. } => "playback_confirmed",
            Self::DeviceSkipped { .. } => "device_skipped",
            Self::AllDevicesBusy { .. } => "all_devices_busy",
            Self::StoppingAll { .. } => "stopping_all",
        }
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
