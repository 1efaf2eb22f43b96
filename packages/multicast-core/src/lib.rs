//! Multicast Core - keeps a pool of Chromecast devices busy with distinct
//! videos from one channel.
//!
//! # Architecture
//!
//! - [`cast`]: Chromecast discovery (mDNS) and control (Cast v2 over TLS)
//! - [`catalog`]: yt-dlp backed list of playable items
//! - [`services`]: device status tracking and the assignment loop
//! - [`events`]: dispatcher activity events
//! - [`config`]: engine configuration
//! - [`error`]: centralized error types
//! - [`bootstrap`]: startup wiring
//!
//! # Abstraction Traits
//!
//! Core logic only talks to its collaborators through traits, so tests run
//! against in-memory fakes:
//!
//! - [`CastClient`](cast::CastClient): discovering and connecting receivers
//! - [`CastControl`](cast::CastControl): commanding one connected receiver
//! - [`CatalogProvider`](catalog::CatalogProvider): fetching item batches
//! - [`EventEmitter`](events::EventEmitter): reporting dispatcher activity

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod cast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol_constants;
pub mod services;

// Re-export commonly used types at the crate root
pub use config::{CastConfig, CatalogConfig, Config, DispatchConfig};
pub use error::{ErrorCode, MulticastError, MulticastResult};
pub use events::{DispatchEvent, EventEmitter, LoggingEventEmitter, NoopEventEmitter};

// Re-export Cast types
pub use cast::{CastClient, CastClientImpl, CastEndpoint, CastError, PlayerState, StatusEvent};

// Re-export catalog types
pub use catalog::{Batch, CatalogError, CatalogProvider, Item, YtDlpCatalog};

// Re-export service types
pub use services::{AvailabilitySignal, Device, DeviceState, Dispatcher};

// Re-export bootstrap
pub use bootstrap::{bootstrap, bootstrap_with};
