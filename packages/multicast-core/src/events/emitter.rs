//! Event emitter abstraction for decoupling the dispatcher from observers.

use super::DispatchEvent;

/// Trait for emitting dispatcher events without knowledge of who listens.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: DispatchEvent);
}

/// No-op emitter; events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: DispatchEvent) {}
}

/// Logging emitter.
///
/// Logs confirmations and skips at info level, everything else at debug.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit(&self, event: DispatchEvent) {
        match &event {
            DispatchEvent::PlaybackConfirmed { device, item_id, .. } => {
                log::info!("[Events] {} is playing {}", device, item_id);
            }
            DispatchEvent::DeviceSkipped {
                device,
                item_id,
                reason,
                ..
            } => {
                log::warn!("[Events] {} skipped {}: {}", device, item_id, reason);
            }
            other => log::debug!("[Events] {}: {:?}", other.label(), other),
        }
    }
}
