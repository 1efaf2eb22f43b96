//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the Google Cast v2 protocol and the mDNS
//! service registration of Cast receivers. Changing them breaks
//! interoperability with real devices.

// ─────────────────────────────────────────────────────────────────────────────
// Discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Cast receiver mDNS service type (note: trailing dot is required by mdns-sd).
pub const CAST_SERVICE_TYPE: &str = "_googlecast._tcp.local.";

/// TCP port of the Cast control channel when mDNS does not report one.
pub const DEFAULT_CAST_PORT: u16 = 8009;

// ─────────────────────────────────────────────────────────────────────────────
// Applications
// ─────────────────────────────────────────────────────────────────────────────

/// App ID of the Default Media Receiver.
///
/// This is the receiver that plays arbitrary media URLs and the one whose
/// presence marks a device as ready.
pub const DEFAULT_MEDIA_RECEIVER_APP_ID: &str = "CC1AD845";

// ─────────────────────────────────────────────────────────────────────────────
// Channel addressing
// ─────────────────────────────────────────────────────────────────────────────

/// Destination ID of the platform receiver on every device.
pub const PLATFORM_RECEIVER_ID: &str = "receiver-0";

/// Virtual connection management namespace.
pub const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";

/// Keep-alive namespace.
pub const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";

/// Platform receiver namespace (launch/stop apps, receiver status).
pub const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";

/// Media channel namespace (load, media status).
pub const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";

// ─────────────────────────────────────────────────────────────────────────────
// Framing
// ─────────────────────────────────────────────────────────────────────────────

/// Largest frame accepted from a device.
///
/// Receivers cap messages at 64 KiB; anything larger is a broken stream.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Size of the big-endian length prefix in front of every frame.
pub const FRAME_LENGTH_PREFIX: usize = 4;
