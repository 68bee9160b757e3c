//! TLS handshake probe.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace, warn};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use super::{Probe, split_host_port};
use crate::error::{ProbeError, ProbeResult};
use crate::types::ProbeReport;

const DEFAULT_TLS_PORT: u16 = 443;

/// Initialize the rustls `CryptoProvider` (once).
///
/// If a provider is already installed (by another part of the application),
/// this is a no-op — `install_default` returns `Err` only to indicate that
/// a provider was already set, which is perfectly fine.
fn ensure_crypto_provider() {
    // Ignore the error: Err means a provider is already installed.
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

/// Client configuration for the handshake: webpki root trust anchors, no
/// client auth. Chain verification is whatever rustls does by default;
/// deeper certificate inspection is out of scope for this probe.
fn client_config() -> ClientConfig {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Checks that the host can complete a TLS handshake.
///
/// Accepts `host:port` or a bare host (port 443 assumed). SNI is derived
/// from the bare host. The connection is closed once the handshake finishes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TlsDialProbe;

#[async_trait]
impl Probe for TlsDialProbe {
    fn name(&self) -> &'static str {
        "TLSDial"
    }

    fn description(&self) -> &'static str {
        "Host can perform TLS handshake"
    }

    async fn run(&self, host: &str) -> ProbeResult<ProbeReport> {
        ensure_crypto_provider();

        let (bare, port) = split_host_port(host)?;
        let port = port.unwrap_or(DEFAULT_TLS_PORT);

        let server_name = ServerName::try_from(bare.clone())
            .map_err(|_| ProbeError::InvalidHost(format!("invalid server name: {bare}")))?;

        debug!("[TLS] Dialing {bare}:{port}...");
        let stream = TcpStream::connect((bare.as_str(), port))
            .await
            .map_err(|e| {
                warn!("[TLS] Connection to {bare}:{port} failed: {e}");
                ProbeError::Network(e.to_string())
            })?;

        trace!("[TLS] Performing handshake with {bare}...");
        let connector = TlsConnector::from(Arc::new(client_config()));
        let tls_stream = connector.connect(server_name, stream).await.map_err(|e| {
            warn!("[TLS] Handshake with {bare}:{port} failed: {e}");
            ProbeError::Tls(e.to_string())
        })?;
        drop(tls_stream);

        Ok(ProbeReport::good(None))
    }
}
