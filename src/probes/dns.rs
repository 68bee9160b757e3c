//! DNS lookup probe.

use async_trait::async_trait;
use log::{debug, trace};

use super::resolver::SHARED_RESOLVER;
use super::{Probe, split_host_port};
use crate::error::{ProbeError, ProbeResult};
use crate::types::{ProbeOutput, ProbeReport};

/// Resolve `host` (optionally `host:port`) to its address strings.
///
/// The port, when present, is stripped before resolution. Address order is
/// whatever the resolver returns; IPv4 and IPv6 may be mixed.
pub(crate) async fn resolve_host(host: &str) -> ProbeResult<Vec<String>> {
    let (bare, _port) = split_host_port(host)?;

    trace!("[DNS] Resolving {bare}...");
    let lookup = SHARED_RESOLVER
        .lookup_ip(bare.as_str())
        .await
        .map_err(|e| ProbeError::Resolution(e.to_string()))?;

    let addrs: Vec<String> = lookup.iter().map(|ip| ip.to_string()).collect();
    if addrs.is_empty() {
        return Err(ProbeError::NoAddresses(bare));
    }

    debug!("[DNS] {bare} resolved to {} address(es)", addrs.len());
    Ok(addrs)
}

/// Checks that DNS resolution of the host returns at least one address.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsLookupProbe;

#[async_trait]
impl Probe for DnsLookupProbe {
    fn name(&self) -> &'static str {
        "DNSLookup"
    }

    fn description(&self) -> &'static str {
        "Host can be resolved through DNS"
    }

    async fn run(&self, host: &str) -> ProbeResult<ProbeReport> {
        let addrs = resolve_host(host).await?;
        Ok(ProbeReport::good(Some(ProbeOutput::Addresses(addrs))))
    }
}
