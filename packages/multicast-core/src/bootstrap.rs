//! Startup wiring.
//!
//! This is the composition root: the one place where the catalog, the
//! Cast client and the devices are created and handed to a
//! [`Dispatcher`]. Startup runs in a fixed order and any failure aborts
//! it before a device is commanded:
//!
//! 1. Validate configuration
//! 2. Resolve the catalog source
//! 3. Discover receivers and select the requested ones
//! 4. Connect to every selected receiver
//! 5. Wrap each session in a [`Device`] sharing one availability signal

use std::sync::Arc;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::cast::{CastClient, CastClientImpl};
use crate::catalog::{CatalogProvider, ProcessRunner, YtDlpCatalog};
use crate::config::Config;
use crate::error::{MulticastError, MulticastResult};
use crate::events::{EventEmitter, LoggingEventEmitter};
use crate::services::{select_devices, AvailabilitySignal, Device, Dispatcher};

/// Builds a ready-to-run dispatcher from configuration.
///
/// `source_url` is the channel/user page; `filters` are device names
/// (empty selects every discovered device). The dispatcher stops when
/// `cancel` fires.
///
/// # Errors
///
/// - [`MulticastError::Configuration`] for invalid settings
/// - [`MulticastError::CatalogResolution`] when `source_url` is not a
///   supported page
/// - [`MulticastError::NoDevices`] / [`MulticastError::DeviceSelection`]
///   from discovery
/// - [`MulticastError::Cast`] when any selected device cannot be connected
pub async fn bootstrap(
    config: &Config,
    source_url: &str,
    filters: &[String],
    cancel: CancellationToken,
) -> MulticastResult<Dispatcher> {
    config.validate().map_err(MulticastError::Configuration)?;

    log::info!("[Bootstrap] Resolving {}", source_url);
    let catalog =
        YtDlpCatalog::resolve(source_url, config.catalog.clone(), Arc::new(ProcessRunner)).await?;

    let client = CastClientImpl::new(config.cast.clone());
    bootstrap_with(
        config,
        &client,
        Box::new(catalog),
        filters,
        Arc::new(LoggingEventEmitter),
        cancel,
    )
    .await
}

/// Discovers, selects and connects devices through `client`, then builds
/// the dispatcher over `catalog`.
pub async fn bootstrap_with(
    config: &Config,
    client: &dyn CastClient,
    catalog: Box<dyn CatalogProvider>,
    filters: &[String],
    emitter: Arc<dyn EventEmitter>,
    cancel: CancellationToken,
) -> MulticastResult<Dispatcher> {
    let discovered = client.discover().await?;
    log::info!(
        "[Bootstrap] Discovered {} receiver(s): {}",
        discovered.len(),
        discovered
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let selected = select_devices(discovered, filters)?;
    let sessions = try_join_all(selected.iter().map(|endpoint| client.connect(endpoint))).await?;

    let availability = Arc::new(AvailabilitySignal::new());
    let devices: Vec<Device> = sessions
        .into_iter()
        .map(|session| {
            log::info!("[Bootstrap] Connected to {}", session.endpoint);
            Device::new(
                session,
                &config.cast.app_id,
                Arc::clone(&availability),
                &config.dispatch,
            )
        })
        .collect();

    Ok(
        Dispatcher::new(catalog, devices, availability, emitter, cancel)
            .with_reset_on_start(config.dispatch.reset_on_start),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::services::test_fixtures::{batch, FakeCastClient, FakeCatalog};
    use std::sync::atomic::Ordering;

    async fn build(
        client: &FakeCastClient,
        filters: &[&str],
    ) -> MulticastResult<Dispatcher> {
        let filters: Vec<String> = filters.iter().map(ToString::to_string).collect();
        bootstrap_with(
            &Config::default(),
            client,
            Box::new(FakeCatalog::new(vec![batch(&["a", "b", "c"])])),
            &filters,
            Arc::new(NoopEventEmitter),
            CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn connects_every_device_without_filters() {
        let client = FakeCastClient::new(&["Den", "Kitchen"]);
        let dispatcher = build(&client, &[]).await.unwrap();
        let names: Vec<&str> = dispatcher.devices().iter().map(Device::name).collect();
        assert_eq!(names, vec!["Den", "Kitchen"]);
        assert_eq!(client.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn connects_only_selected_devices() {
        let client = FakeCastClient::new(&["Attic", "Den", "Kitchen"]);
        let dispatcher = build(&client, &["Kitchen"]).await.unwrap();
        assert_eq!(dispatcher.devices().len(), 1);
        assert_eq!(dispatcher.devices()[0].name(), "Kitchen");
        assert_eq!(client.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_name_fails_before_connecting() {
        let client = FakeCastClient::new(&["Den"]);
        let err = build(&client, &["Patio"]).await.unwrap_err();
        assert!(matches!(err, MulticastError::DeviceSelection { .. }));
        assert_eq!(client.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_network_is_reported() {
        let client = FakeCastClient::new(&[]);
        let err = build(&client, &[]).await.unwrap_err();
        assert!(matches!(err, MulticastError::NoDevices));
    }

    #[tokio::test]
    async fn connection_failure_is_fatal() {
        let mut client = FakeCastClient::new(&["Den", "Kitchen"]);
        client.fail_connect = Some("Kitchen".to_string());
        let err = build(&client, &[]).await.unwrap_err();
        assert!(matches!(err, MulticastError::Cast(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_first() {
        let mut config = Config::default();
        config.cast.heartbeat_interval_ms = 0;
        let err = bootstrap(&config, "https://example.invalid", &[], CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MulticastError::Configuration(_)));
    }
}
