//! The assignment loop.
//!
//! Each round fetches a fresh batch from the catalog, hands every free
//! device the next item nobody is playing, then sleeps on the
//! [`AvailabilitySignal`] until some device finishes.
//!
//! # Rounds
//!
//! 1. Fetch a batch; fewer items than devices is fatal.
//! 2. Collect the item IDs of active devices and the free devices, in
//!    pool order.
//! 3. Plan: walk one cursor over the batch, giving each free device the
//!    first item not already playing. Running out is fatal, and no device
//!    is commanded in that case.
//! 4. Play each planned assignment in order, waiting for confirmation.
//! 5. Clear the signal if every device is now active, then wait on it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cast::CastError;
use crate::catalog::{Batch, CatalogProvider, Item};
use crate::error::{ErrorCode, MulticastError, MulticastResult};
use crate::events::{now_millis, DispatchEvent, EventEmitter};

use super::availability::AvailabilitySignal;
use super::device::Device;

/// What the planner needs to know about one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub active: bool,
    pub current_item_id: Option<String>,
}

/// One planned `play`: pool index and item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub device_index: usize,
    pub item: Item,
}

/// Result of one completed round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    /// Devices that confirmed their new item.
    pub confirmed: usize,
    /// Devices that did not confirm within the timeout.
    pub skipped: usize,
    /// Whether every device was active at the end of the round.
    pub all_busy: bool,
}

/// Plans one round of assignments.
///
/// Free devices are served in pool order from a single pass over `batch`;
/// an item is never assigned while any device (active or newly planned)
/// holds its ID.
///
/// # Errors
///
/// [`MulticastError::InsufficientContent`] when the batch runs out before
/// every free device has an item.
pub fn plan_assignments(
    devices: &[DeviceSnapshot],
    batch: &Batch,
) -> MulticastResult<Vec<Assignment>> {
    let mut playing: HashSet<&str> = devices
        .iter()
        .filter(|d| d.active)
        .filter_map(|d| d.current_item_id.as_deref())
        .collect();

    let free: Vec<usize> = devices
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.active)
        .map(|(i, _)| i)
        .collect();

    let mut cursor = batch.iter();
    let mut plan = Vec::with_capacity(free.len());
    for &device_index in &free {
        let next = cursor.by_ref().find(|item| !playing.contains(item.id.as_str()));
        match next {
            Some(item) => {
                playing.insert(item.id.as_str());
                plan.push(Assignment {
                    device_index,
                    item: item.clone(),
                });
            }
            None => {
                return Err(MulticastError::InsufficientContent {
                    required: free.len(),
                    available: plan.len(),
                });
            }
        }
    }
    Ok(plan)
}

/// Keeps a pool of devices busy with distinct catalog items.
pub struct Dispatcher {
    catalog: Box<dyn CatalogProvider>,
    devices: Vec<Device>,
    availability: Arc<AvailabilitySignal>,
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
    reset_on_start: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("devices", &self.devices)
            .field("reset_on_start", &self.reset_on_start)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over `devices`, which must share `availability`
    /// with their trackers.
    pub fn new(
        catalog: Box<dyn CatalogProvider>,
        devices: Vec<Device>,
        availability: Arc<AvailabilitySignal>,
        emitter: Arc<dyn EventEmitter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            devices,
            availability,
            emitter,
            cancel,
            reset_on_start: true,
        }
    }

    /// Whether to stop every device before the first round.
    #[must_use]
    pub fn with_reset_on_start(mut self, reset: bool) -> Self {
        self.reset_on_start = reset;
        self
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Runs rounds until cancelled or a fatal error occurs.
    ///
    /// Cancellation stops every device and returns `Ok(())`. Fatal errors
    /// are returned as-is, leaving devices untouched.
    pub async fn run(mut self) -> MulticastResult<()> {
        let cancel = self.cancel.clone();

        if self.reset_on_start {
            log::info!("[Dispatcher] Resetting {} device(s)", self.devices.len());
            for device in &self.devices {
                if let Err(e) = device.stop().await {
                    log::warn!("[Dispatcher] Could not reset {}: {}", device.name(), e);
                }
            }
        }

        loop {
            let round = tokio::select! {
                _ = cancel.cancelled() => None,
                round = self.run_round() => Some(round),
            };
            match round {
                None => break,
                Some(Err(e)) => {
                    log::error!("[Dispatcher] {}", e);
                    return Err(e);
                }
                Some(Ok(summary)) => {
                    log::debug!("[Dispatcher] Round done: {:?}", summary);
                }
            }

            let woke = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = self.availability.wait() => true,
            };
            if !woke {
                break;
            }
        }

        self.stop_all().await;
        Ok(())
    }

    /// Runs one fetch/plan/play round.
    pub async fn run_round(&mut self) -> MulticastResult<RoundSummary> {
        let batch = self.catalog.update().await?;
        self.emitter.emit(DispatchEvent::BatchFetched {
            entry_count: self.catalog.entry_count(),
            playable: batch.len(),
            timestamp: now_millis(),
        });

        if batch.len() < self.devices.len() {
            return Err(MulticastError::InsufficientContent {
                required: self.devices.len(),
                available: batch.len(),
            });
        }

        let snapshots: Vec<DeviceSnapshot> = self
            .devices
            .iter()
            .map(|d| DeviceSnapshot {
                active: d.is_active(),
                current_item_id: d.current_item_id(),
            })
            .collect();
        let plan = plan_assignments(&snapshots, &batch)?;

        let mut summary = RoundSummary::default();
        for assignment in plan {
            let device = &self.devices[assignment.device_index];
            let item_id = assignment.item.id.clone();
            self.emitter.emit(DispatchEvent::PlaybackRequested {
                device: device.name().to_string(),
                item_id: item_id.clone(),
                timestamp: now_millis(),
            });

            match device.play(&assignment.item).await {
                Ok(()) => {
                    summary.confirmed += 1;
                    self.emitter.emit(DispatchEvent::PlaybackConfirmed {
                        device: device.name().to_string(),
                        item_id,
                        timestamp: now_millis(),
                    });
                }
                Err(e @ CastError::ConfirmationTimeout(..)) => {
                    summary.skipped += 1;
                    log::warn!(
                        "[Dispatcher] Skipping {} this round ({}): {}",
                        device.name(),
                        e.code(),
                        e
                    );
                    self.emitter.emit(DispatchEvent::DeviceSkipped {
                        device: device.name().to_string(),
                        item_id,
                        reason: e.to_string(),
                        timestamp: now_millis(),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        if self.release_if_all_busy() {
            summary.all_busy = true;
            self.emitter.emit(DispatchEvent::AllDevicesBusy {
                device_count: self.devices.len(),
                timestamp: now_millis(),
            });
        }

        Ok(summary)
    }

    /// Clears the availability signal when every device is active.
    ///
    /// A tracker may free its device between the check and the clear; the
    /// second check catches that and re-raises the signal it just dropped.
    fn release_if_all_busy(&self) -> bool {
        if !self.devices.iter().all(Device::is_active) {
            return false;
        }
        self.availability.clear();
        if self.devices.iter().all(Device::is_active) {
            return true;
        }
        self.availability.set();
        false
    }

    /// Stops every device, logging failures.
    pub async fn stop_all(&self) {
        log::info!("[Dispatcher] Stopping all {} device(s)", self.devices.len());
        self.emitter.emit(DispatchEvent::StoppingAll {
            device_count: self.devices.len(),
            timestamp: now_millis(),
        });
        for device in &self.devices {
            if let Err(e) = device.stop().await {
                log::warn!("[Dispatcher] Failed to stop {}: {}", device.name(), e);
            }
        }
    }
}
