//! Unified error types for probe execution.

use serde::Serialize;
use thiserror::Error;

/// Probe error taxonomy.
///
/// Every failure in this crate is representable as a returned error value;
/// nothing panics and nothing is swallowed. Errors are `Clone` because the
/// range cache replays its memoized failure verbatim to every later caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ProbeError {
    /// Malformed host or `host:port` input.
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    /// DNS resolver failure (NXDOMAIN, network unreachable, ...).
    #[error("DNS resolution failed: {0}")]
    Resolution(String),

    /// Resolution succeeded syntactically but returned zero addresses.
    #[error("No addresses found for host: {0}")]
    NoAddresses(String),

    /// TCP connect or HTTP transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// TLS handshake failure.
    #[error("TLS handshake failed: {0}")]
    Tls(String),

    /// A published IP range document could not be downloaded.
    #[error("Couldn't download CloudFlare IPs: {0}")]
    RangeFetch(String),

    /// A line of a range document did not parse as a CIDR network.
    #[error("Couldn't parse CIDR range: {0}")]
    RangeParse(String),
}

/// Result type alias used throughout the crate.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
