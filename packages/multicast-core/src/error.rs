//! Centralized error types for the multicast core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to machine-readable codes
//! - Maps errors to process exit codes for the CLI

use thiserror::Error;

use crate::cast::CastError;
use crate::catalog::CatalogError;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code.
    fn code(&self) -> &'static str;
}

impl ErrorCode for CastError {
    fn code(&self) -> &'static str {
        match self {
            Self::Mdns(_) => "mdns_daemon_failed",
            Self::Connect { .. } => "connect_failed",
            Self::Tls(_, _) => "tls_handshake_failed",
            Self::Timeout(_, _) => "device_timeout",
            Self::Send(_, _) => "send_failed",
            Self::Disconnected(_) => "device_disconnected",
            Self::ConfirmationTimeout(_, _) => "confirmation_timeout",
            Self::Frame(_) => "malformed_frame",
            Self::Io(_) => "io_error",
        }
    }
}

impl ErrorCode for CatalogError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSource(_) => "unsupported_source",
            Self::Spawn { .. } => "extractor_spawn_failed",
            Self::CommandFailed { .. } => "extractor_failed",
            Self::Parse(_) => "extractor_output_invalid",
        }
    }
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum MulticastError {
    /// The catalog URL is not a supported channel/user page.
    #[error("Invalid YouTube channel/user url: {0}")]
    CatalogResolution(String),

    /// Discovery returned no devices.
    #[error("No Chromecast devices found.")]
    NoDevices,

    /// Some requested device names were not discovered.
    #[error("Invalid Chromecast list: not found: {}", .missing.join(", "))]
    DeviceSelection { missing: Vec<String> },

    /// Fewer distinct items than devices to fill.
    #[error("Not enough videos on channel/user page: {required} needed, {available} available")]
    InsufficientContent { required: usize, available: usize },

    /// Device communication failed.
    #[error("Cast error: {0}")]
    Cast(String),

    /// Catalog refresh failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl MulticastError {
    /// Returns a machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CatalogResolution(_) => "invalid_catalog_url",
            Self::NoDevices => "no_devices_found",
            Self::DeviceSelection { .. } => "device_selection_failed",
            Self::InsufficientContent { .. } => "insufficient_content",
            Self::Cast(_) => "cast_error",
            Self::Catalog(_) => "catalog_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::CatalogResolution(_) => 2,
            Self::NoDevices => 3,
            Self::DeviceSelection { .. } => 4,
            Self::InsufficientContent { .. } => 5,
            Self::Cast(_) | Self::Catalog(_) | Self::Configuration(_) => 1,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type MulticastResult<T> = Result<T, MulticastError>;

impl From<CastError> for MulticastError {
    fn from(err: CastError) -> Self {
        Self::Cast(err.to_string())
    }
}

impl From<CatalogError> for MulticastError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnsupportedSource(url) => Self::CatalogResolution(url),
            other => Self::Catalog(other.to_string()),
        }
    }
}
