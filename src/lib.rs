//! Host connectivity probe toolbox.
//!
//! Answers "can I reach this host, and how, at the network layer" through a
//! small registry of named probes: DNS resolution, CloudFlare range
//! membership, raw TCP connect, and TLS handshake.
//!
//! Probes are stateless async calls, except the CloudFlare membership check,
//! which shares a process-wide, fetch-once cache of the published CIDR
//! ranges (success and failure are both memoized for the life of the
//! process).
//!
//! ```rust,no_run
//! use hostprobe::{Grade, connectivity};
//! # async fn demo() -> hostprobe::ProbeResult<()> {
//! let family = connectivity();
//! if let Some(probe) = family.get("DNSLookup") {
//!     let report = probe.run("example.com").await?;
//!     assert_eq!(report.grade, Grade::Good);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod probes;
mod types;

pub use error::{ProbeError, ProbeResult};
pub use probes::{
    CloudFlareStatusProbe, DnsLookupProbe, Family, HttpRangeSource, Probe, RangeCache,
    RangeSource, TcpDialProbe, TlsDialProbe, connectivity, split_host_port,
};
pub use types::{Grade, ProbeOutput, ProbeReport};
