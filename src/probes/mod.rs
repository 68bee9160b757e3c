//! Probe registry: the [`Probe`] trait, the [`Family`] map, and shared host
//! input handling.

mod cloudflare;
mod dns;
mod resolver;
mod tcp;
mod tls;

use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ProbeError, ProbeResult};
use crate::types::ProbeReport;

pub use cloudflare::{CloudFlareStatusProbe, HttpRangeSource, RangeCache, RangeSource};
pub use dns::DnsLookupProbe;
pub use tcp::TcpDialProbe;
pub use tls::TlsDialProbe;

/// A single named connectivity check.
///
/// Probes are stateless and `Send + Sync`; any number of tasks may run the
/// same probe concurrently. A probe performs one attempt per run — retries,
/// backoff, and timeouts are the caller's business.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Registry name, unique within a [`Family`] (e.g. `"DNSLookup"`).
    fn name(&self) -> &'static str;

    /// Human-readable description of what the probe verifies.
    fn description(&self) -> &'static str;

    /// Execute the check against `host`.
    async fn run(&self, host: &str) -> ProbeResult<ProbeReport>;
}

/// A named group of probes, looked up by registry name.
pub struct Family {
    /// What this group of probes covers.
    pub description: &'static str,
    probes: HashMap<&'static str, Arc<dyn Probe>>,
}

impl Family {
    fn new(description: &'static str, probes: Vec<Arc<dyn Probe>>) -> Self {
        Self {
            description,
            probes: probes.into_iter().map(|p| (p.name(), p)).collect(),
        }
    }

    /// Look up a probe by its registry name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Probe>> {
        self.probes.get(name).cloned()
    }

    /// Registered probe names, sorted for stable enumeration.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.probes.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Iterate over the registered probes (no particular order).
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Probe>> {
        self.probes.values()
    }

    /// Number of registered probes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether the family is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// Build the connectivity family: DNS lookup, CloudFlare range membership,
/// TCP dial, and TLS dial.
///
/// The membership probe in the returned family shares the process-wide range
/// cache, so repeated family constructions never re-download the range
/// documents.
#[must_use]
pub fn connectivity() -> Family {
    Family::new(
        "Probes for basic connectivity with the host through DNS and TCP/TLS dials",
        vec![
            Arc::new(DnsLookupProbe),
            Arc::new(CloudFlareStatusProbe::default()),
            Arc::new(TcpDialProbe),
            Arc::new(TlsDialProbe),
        ],
    )
}

fn parse_port(port: &str, input: &str) -> ProbeResult<u16> {
    port.parse()
        .map_err(|_| ProbeError::InvalidHost(format!("invalid port in {input}")))
}

/// Split a `host`, `host:port`, `[v6]:port`, or bare IPv6 input into the
/// bare host and an optional port.
///
/// Fails on empty input, a non-numeric or out-of-range port, and ambiguous
/// colon soup such as `"host:::bad"` — all before any network activity.
pub fn split_host_port(input: &str) -> ProbeResult<(String, Option<u16>)> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ProbeError::InvalidHost("host is required".to_string()));
    }

    // Bracketed IPv6: `[::1]` or `[::1]:443`.
    if let Some(rest) = input.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(ProbeError::InvalidHost(format!("missing ']' in {input}")));
        };
        if host.parse::<Ipv6Addr>().is_err() {
            return Err(ProbeError::InvalidHost(format!(
                "invalid IPv6 literal in {input}"
            )));
        }
        return match after.strip_prefix(':') {
            Some(port) => Ok((host.to_string(), Some(parse_port(port, input)?))),
            None if after.is_empty() => Ok((host.to_string(), None)),
            None => Err(ProbeError::InvalidHost(format!(
                "unexpected characters after ']' in {input}"
            ))),
        };
    }

    // Bare IPv6 literal, no port.
    if input.parse::<Ipv6Addr>().is_ok() {
        return Ok((input.to_string(), None));
    }

    match input.split_once(':') {
        None => Ok((input.to_string(), None)),
        Some((host, port)) => {
            if host.is_empty() {
                return Err(ProbeError::InvalidHost(format!("empty host in {input}")));
            }
            if port.contains(':') {
                return Err(ProbeError::InvalidHost(format!(
                    "too many colons in {input}"
                )));
            }
            Ok((host.to_string(), Some(parse_port(port, input)?)))
        }
    }
}
