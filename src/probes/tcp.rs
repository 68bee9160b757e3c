//! Raw TCP dial probe.

use async_trait::async_trait;
use log::{debug, warn};
use tokio::net::TcpStream;

use super::{Probe, split_host_port};
use crate::error::{ProbeError, ProbeResult};
use crate::types::ProbeReport;

/// Checks that the host accepts a TCP connection.
///
/// Expects `host:port` input. A single dial attempt determines the verdict;
/// the connection is closed immediately on success.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialProbe;

#[async_trait]
impl Probe for TcpDialProbe {
    fn name(&self) -> &'static str {
        "TCPDial"
    }

    fn description(&self) -> &'static str {
        "Host accepts TCP connection"
    }

    async fn run(&self, host: &str) -> ProbeResult<ProbeReport> {
        let (bare, port) = split_host_port(host)?;
        let Some(port) = port else {
            return Err(ProbeError::InvalidHost(format!(
                "port required for TCP dial: {host}"
            )));
        };

        debug!("[TCP] Dialing {bare}:{port}...");
        let stream = TcpStream::connect((bare.as_str(), port))
            .await
            .map_err(|e| {
                warn!("[TCP] Connection to {bare}:{port} failed: {e}");
                ProbeError::Network(e.to_string())
            })?;
        drop(stream);

        Ok(ProbeReport::good(None))
    }
}
