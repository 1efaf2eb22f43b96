//! Chromecast discovery and control over the Cast v2 protocol.
//!
//! # Module Structure
//!
//! - `types` - Endpoints, player states, status events and errors
//! - `traits` - Trait abstractions for testability
//! - `framing` - Length-prefixed protobuf `CastMessage` codec
//! - `messages` - JSON payloads for the connection/heartbeat/receiver/media namespaces
//! - `router` - Turns inbound messages into status events and protocol replies
//! - `connection` - TLS control channel with reader and heartbeat tasks
//! - `discovery` - mDNS browse for `_googlecast._tcp`
//! - `client` - `CastClientImpl` concrete trait implementation

pub mod client;
pub mod connection;
pub mod discovery;
pub mod framing;
pub mod messages;
pub(crate) mod router;
pub mod traits;
pub mod types;

// Re-export domain types
pub use types::{CastEndpoint, CastError, CastResult, PlayerState, StatusEvent};

// Re-export trait abstractions
pub use traits::{CastClient, CastConnector, CastControl, CastDiscovery, CastSession};

// Re-export concrete implementation
pub use client::CastClientImpl;
