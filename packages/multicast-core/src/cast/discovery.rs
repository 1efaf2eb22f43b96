//! mDNS-based Cast receiver discovery.
//!
//! Browses for `_googlecast._tcp.local.` services for a fixed window and
//! turns each resolved service into a [`CastEndpoint`]. Receivers publish
//! their friendly name (`fn`), model (`md`) and UUID (`id`) in TXT records.
//!
//! - Uses resolved record data (IP from SRV/A answers), never the hostname
//! - Calls `stop_browse()` after the window to avoid accumulating daemon work

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use mdns_sd::{ResolvedService, ScopedIp, ServiceDaemon, ServiceEvent};
use tokio::time::timeout;

use crate::cast::types::{CastEndpoint, CastError, CastResult};
use crate::protocol_constants::{CAST_SERVICE_TYPE, DEFAULT_CAST_PORT};

/// Browses for Cast receivers for `browse_timeout`.
///
/// Endpoints are de-duplicated by UUID (or address when no UUID is
/// published) and returned sorted by name.
pub async fn discover_cast_endpoints(
    daemon: &ServiceDaemon,
    browse_timeout: Duration,
) -> CastResult<Vec<CastEndpoint>> {
    log::debug!(
        "[mDNS] Browsing for Cast receivers, timeout: {}ms",
        browse_timeout.as_millis()
    );

    let receiver = daemon
        .browse(CAST_SERVICE_TYPE)
        .map_err(|e| CastError::Mdns(e.to_string()))?;

    let mut discovered: HashMap<String, CastEndpoint> = HashMap::new();
    let start = std::time::Instant::now();
    while start.elapsed() < browse_timeout {
        let remaining = browse_timeout.saturating_sub(start.elapsed());
        match timeout(remaining, receiver.recv_async()).await {
            Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                log::trace!("[mDNS] Service resolved: {}", info.fullname);
                if let Some(endpoint) = parse_resolved_service(&info) {
                    log::debug!("[mDNS] Discovered {}", endpoint);
                    discovered.insert(dedup_key(&endpoint), endpoint);
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                log::debug!("[mDNS] Browse channel closed: {:?}", e);
                break;
            }
            Err(_) => break,
        }
    }

    if let Err(e) = daemon.stop_browse(CAST_SERVICE_TYPE) {
        log::warn!("[mDNS] Failed to stop browse: {:?}", e);
    }

    let mut endpoints: Vec<CastEndpoint> = discovered.into_values().collect();
    sort_endpoints(&mut endpoints);
    log::info!("[mDNS] Found {} Cast receiver(s)", endpoints.len());
    Ok(endpoints)
}

fn parse_resolved_service(info: &ResolvedService) -> Option<CastEndpoint> {
    let addresses: Vec<Ipv4Addr> = info
        .addresses
        .iter()
        .filter_map(|addr: &ScopedIp| match addr.to_ip_addr() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();

    endpoint_from_records(
        &info.fullname,
        &addresses,
        info.port,
        TxtRecords {
            friendly_name: info.get_property_val_str("fn"),
            model: info.get_property_val_str("md"),
            id: info.get_property_val_str("id"),
        },
    )
}

/// The TXT values a Cast receiver advertises.
#[derive(Debug, Default, Clone, Copy)]
struct TxtRecords<'a> {
    friendly_name: Option<&'a str>,
    model: Option<&'a str>,
    id: Option<&'a str>,
}

fn endpoint_from_records(
    fullname: &str,
    addresses: &[Ipv4Addr],
    port: u16,
    txt: TxtRecords<'_>,
) -> Option<CastEndpoint> {
    let host = addresses.iter().min()?.to_string();
    let port = if port > 0 { port } else { DEFAULT_CAST_PORT };

    let name = non_empty(txt.friendly_name)
        .unwrap_or_else(|| instance_name_from_fullname(fullname));

    let mut endpoint = CastEndpoint::new(name, host, port);
    endpoint.model = non_empty(txt.model);
    endpoint.uuid = non_empty(txt.id);
    Some(endpoint)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// Strips the service type from an instance name
/// (`Chromecast-abc._googlecast._tcp.local.` → `Chromecast-abc`).
fn instance_name_from_fullname(fullname: &str) -> String {
    let suffix = format!(".{}", CAST_SERVICE_TYPE);
    fullname
        .trim()
        .strip_suffix(suffix.as_str())
        .unwrap_or(fullname)
        .trim_matches('.')
        .to_string()
}

fn dedup_key(endpoint: &CastEndpoint) -> String {
    endpoint
        .uuid
        .clone()
        .unwrap_or_else(|| endpoint.address())
}

fn sort_endpoints(endpoints: &mut [CastEndpoint]) {
    endpoints.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.address().cmp(&b.address()))
    });
}

/// Creates the mDNS daemon used for discovery.
///
/// The daemon spawns a background thread; create it once per process.
pub fn create_daemon() -> CastResult<ServiceDaemon> {
    ServiceDaemon::new().map_err(|e| CastError::Mdns(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txt<'a>(name: &'a str, model: &'a str, id: &'a str) -> TxtRecords<'a> {
        TxtRecords {
            friendly_name: Some(name),
            model: Some(model),
            id: Some(id),
        }
    }

    #[test]
    fn txt_records_populate_endpoint() {
        let endpoint = endpoint_from_records(
            "Chromecast-1a2b._googlecast._tcp.local.",
            &[Ipv4Addr::new(192, 168, 1, 30)],
            8009,
            txt("Living Room TV", "Chromecast Ultra", "1a2b3c"),
        )
        .unwrap();
        assert_eq!(endpoint.name, "Living Room TV");
        assert_eq!(endpoint.host, "192.168.1.30");
        assert_eq!(endpoint.port, 8009);
        assert_eq!(endpoint.model.as_deref(), Some("Chromecast Ultra"));
        assert_eq!(endpoint.uuid.as_deref(), Some("1a2b3c"));
    }

    #[test]
    fn missing_friendly_name_falls_back_to_instance_name() {
        let endpoint = endpoint_from_records(
            "Chromecast-1a2b._googlecast._tcp.local.",
            &[Ipv4Addr::new(10, 0, 0, 5)],
            8009,
            TxtRecords::default(),
        )
        .unwrap();
        assert_eq!(endpoint.name, "Chromecast-1a2b");
        assert!(endpoint.uuid.is_none());
    }

    #[test]
    fn blank_txt_values_are_ignored() {
        let endpoint = endpoint_from_records(
            "Den._googlecast._tcp.local.",
            &[Ipv4Addr::new(10, 0, 0, 5)],
            8009,
            txt("  ", "", " "),
        )
        .unwrap();
        assert_eq!(endpoint.name, "Den");
        assert!(endpoint.model.is_none());
        assert!(endpoint.uuid.is_none());
    }

    #[test]
    fn lowest_ipv4_wins_and_zero_port_defaults() {
        let endpoint = endpoint_from_records(
            "Den._googlecast._tcp.local.",
            &[Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 2)],
            0,
            TxtRecords::default(),
        )
        .unwrap();
        assert_eq!(endpoint.host, "10.0.0.2");
        assert_eq!(endpoint.port, DEFAULT_CAST_PORT);
    }

    #[test]
    fn service_without_ipv4_is_skipped() {
        assert!(endpoint_from_records(
            "Den._googlecast._tcp.local.",
            &[],
            8009,
            TxtRecords::default()
        )
        .is_none());
    }

    #[test]
    fn endpoints_sort_case_insensitively_by_name() {
        let mut endpoints = vec![
            CastEndpoint::new("kitchen", "10.0.0.3", 8009),
            CastEndpoint::new("Bedroom", "10.0.0.2", 8009),
            CastEndpoint::new("Attic", "10.0.0.4", 8009),
        ];
        sort_endpoints(&mut endpoints);
        let names: Vec<_> = endpoints.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Attic", "Bedroom", "kitchen"]);
    }

    #[test]
    fn dedup_prefers_uuid_over_address() {
        let mut endpoint = CastEndpoint::new("Den", "10.0.0.2", 8009);
        assert_eq!(dedup_key(&endpoint), "10.0.0.2:8009");
        endpoint.uuid = Some("abc".to_string());
        assert_eq!(dedup_key(&endpoint), "abc");
    }
}
