//! Narrowing discovered receivers down to the requested pool.

use crate::cast::CastEndpoint;
use crate::error::{MulticastError, MulticastResult};

/// Picks the endpoints named in `filters`, in discovery order.
///
/// An empty filter list selects everything. Names match exactly. Every
/// filter must match at least one endpoint.
///
/// # Errors
///
/// - [`MulticastError::NoDevices`] when nothing was discovered
/// - [`MulticastError::DeviceSelection`] listing every unmatched name
pub fn select_devices(
    discovered: Vec<CastEndpoint>,
    filters: &[String],
) -> MulticastResult<Vec<CastEndpoint>> {
    if discovered.is_empty() {
        return Err(MulticastError::NoDevices);
    }
    if filters.is_empty() {
        return Ok(discovered);
    }

    let missing: Vec<String> = filters
        .iter()
        .filter(|name| !discovered.iter().any(|e| &e.name == *name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(MulticastError::DeviceSelection { missing });
    }

    Ok(discovered
        .into_iter()
        .filter(|e| filters.contains(&e.name))
        .collect())
}
