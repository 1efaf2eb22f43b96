//! Concrete Cast client: mDNS discovery plus TLS connections.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use mdns_sd::ServiceDaemon;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::cast::connection::CastConnection;
use crate::cast::discovery::{create_daemon, discover_cast_endpoints};
use crate::cast::traits::{CastConnector, CastDiscovery, CastSession};
use crate::cast::types::{CastEndpoint, CastError, CastResult};
use crate::config::CastConfig;

/// Production implementation of [`CastClient`](crate::cast::CastClient).
pub struct CastClientImpl {
    config: CastConfig,
    /// mDNS daemon (lazily started on first discovery).
    daemon: OnceLock<ServiceDaemon>,
}

impl std::fmt::Debug for CastClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastClientImpl")
            .field("config", &self.config)
            .field("daemon_started", &self.daemon.get().is_some())
            .finish()
    }
}

impl CastClientImpl {
    #[must_use]
    pub fn new(config: CastConfig) -> Self {
        Self {
            config,
            daemon: OnceLock::new(),
        }
    }

    fn daemon(&self) -> CastResult<&ServiceDaemon> {
        if let Some(daemon) = self.daemon.get() {
            return Ok(daemon);
        }
        let daemon = create_daemon()?;
        Ok(self.daemon.get_or_init(|| daemon))
    }

    /// Opens TCP and completes the TLS handshake.
    ///
    /// Receivers present self-signed certificates, so certificate and
    /// hostname validation are both off.
    async fn open_tls(
        &self,
        endpoint: &CastEndpoint,
    ) -> CastResult<tokio_native_tls::TlsStream<TcpStream>> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        let tcp = match timeout(connect_timeout, TcpStream::connect(endpoint.address())).await {
            Ok(Ok(tcp)) => tcp,
            Ok(Err(source)) => {
                return Err(CastError::Connect {
                    name: endpoint.name.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(CastError::Timeout(
                    endpoint.name.clone(),
                    self.config.connect_timeout_ms,
                ))
            }
        };
        if let Err(e) = tcp.set_nodelay(true) {
            log::debug!("[Cast] Could not disable Nagle for {}: {}", endpoint, e);
        }

        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| CastError::Tls(endpoint.name.clone(), e.to_string()))?;
        let connector = tokio_native_tls::TlsConnector::from(connector);

        match timeout(connect_timeout, connector.connect(&endpoint.host, tcp)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(CastError::Tls(endpoint.name.clone(), e.to_string())),
            Err(_) => Err(CastError::Timeout(
                endpoint.name.clone(),
                self.config.connect_timeout_ms,
            )),
        }
    }
}

#[async_trait]
impl CastDiscovery for CastClientImpl {
    async fn discover(&self) -> CastResult<Vec<CastEndpoint>> {
        let daemon = self.daemon()?;
        discover_cast_endpoints(
            daemon,
            Duration::from_millis(self.config.discovery_timeout_ms),
        )
        .await
    }
}

#[async_trait]
impl CastConnector for CastClientImpl {
    async fn connect(&self, endpoint: &CastEndpoint) -> CastResult<CastSession> {
        log::debug!("[Cast] Connecting to {}", endpoint);
        let stream = self.open_tls(endpoint).await?;
        CastConnection::establish(endpoint, stream, &self.config).await
    }
}

impl Drop for CastClientImpl {
    fn drop(&mut self) {
        if let Some(daemon) = self.daemon.get() {
            if let Err(e) = daemon.shutdown() {
                log::debug!("[mDNS] Daemon shutdown failed: {:?}", e);
            }
        }
    }
}
