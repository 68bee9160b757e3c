//! CloudFlare range membership probe and its fetch-once range cache.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use ipnetwork::IpNetwork;
use log::{debug, trace, warn};
use tokio::sync::OnceCell;

use super::Probe;
use super::dns::resolve_host;
use crate::error::{ProbeError, ProbeResult};
use crate::types::{Grade, ProbeOutput, ProbeReport};

/// Published CloudFlare range documents, one per IP family.
const CLOUDFLARE_IPS_V4_URL: &str = "https://www.cloudflare.com/ips-v4";
const CLOUDFLARE_IPS_V6_URL: &str = "https://www.cloudflare.com/ips-v6";

/// HTTP collaborator boundary for fetching range documents.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// `GET` the document at `url` and return its body as text.
    async fn fetch(&self, url: &str) -> ProbeResult<String>;
}

/// Shared HTTP client for range document downloads.
static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// [`RangeSource`] backed by the shared reqwest client.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpRangeSource;

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn fetch(&self, url: &str) -> ProbeResult<String> {
        trace!("[CF] GET {url}");
        let response = HTTP_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::RangeFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProbeError::RangeFetch(e.to_string()))?;
        response
            .text()
            .await
            .map_err(|e| ProbeError::RangeFetch(e.to_string()))
    }
}

/// Fetch-once cache of the published CIDR ranges.
///
/// Three phases: uninitialized (no fetch attempted), populated (parsed
/// networks served to every caller), failed (the first error replayed
/// verbatim to every caller). The transition out of uninitialized happens
/// exactly once per process; there is no refresh and no retry.
pub struct RangeCache {
    source: Arc<dyn RangeSource>,
    v4_url: String,
    v6_url: String,
    state: OnceCell<Result<Arc<Vec<IpNetwork>>, ProbeError>>,
}

impl RangeCache {
    /// Cache over a custom source and document URLs.
    #[must_use]
    pub fn new(
        source: Arc<dyn RangeSource>,
        v4_url: impl Into<String>,
        v6_url: impl Into<String>,
    ) -> Self {
        Self {
            source,
            v4_url: v4_url.into(),
            v6_url: v6_url.into(),
            state: OnceCell::new(),
        }
    }

    /// Cache over the published CloudFlare documents.
    #[must_use]
    pub fn cloudflare() -> Self {
        Self::new(
            Arc::new(HttpRangeSource),
            CLOUDFLARE_IPS_V4_URL,
            CLOUDFLARE_IPS_V6_URL,
        )
    }

    /// The cached ranges, fetching and parsing them on first use.
    ///
    /// Concurrent first callers are serialized; all converge on the same
    /// populated-or-failed state, and the documents are fetched at most once
    /// per process.
    pub async fn ranges(&self) -> ProbeResult<Arc<Vec<IpNetwork>>> {
        self.state
            .get_or_init(|| self.fetch_and_parse())
            .await
            .clone()
    }

    /// Download both documents and parse every non-empty line as CIDR.
    ///
    /// Any fetch or parse failure aborts the whole attempt; partial results
    /// never populate the cache.
    async fn fetch_and_parse(&self) -> Result<Arc<Vec<IpNetwork>>, ProbeError> {
        let v4_body = self.source.fetch(&self.v4_url).await?;
        let v6_body = self.source.fetch(&self.v6_url).await?;

        // Document A, a newline separator, then document B, line by line.
        let combined = format!("{v4_body}\n{v6_body}");
        let mut nets = Vec::new();
        for line in combined.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let net: IpNetwork = line.parse().map_err(|e| {
                warn!("[CF] Malformed CIDR line {line:?}: {e}");
                ProbeError::RangeParse(format!("{line}: {e}"))
            })?;
            nets.push(net);
        }

        debug!("[CF] Cached {} CloudFlare range(s)", nets.len());
        Ok(Arc::new(nets))
    }
}

/// Process-wide cache shared by every default-constructed membership probe.
static SHARED_CACHE: LazyLock<Arc<RangeCache>> =
    LazyLock::new(|| Arc::new(RangeCache::cloudflare()));

/// Test each address against the networks; first matching network wins per
/// address, but every address is checked even after a miss so the caller
/// gets the complete per-address picture.
fn membership(addrs: &[String], nets: &[IpNetwork]) -> (Grade, BTreeMap<String, bool>) {
    let mut status = BTreeMap::new();
    let mut grade = Grade::Good;
    for addr in addrs {
        let in_range = addr
            .parse::<IpAddr>()
            .is_ok_and(|ip| nets.iter().any(|net| net.contains(ip)));
        if !in_range {
            grade = Grade::Bad;
        }
        status.insert(addr.clone(), in_range);
    }
    (grade, status)
}

/// Checks whether every resolved address of the host sits inside a published
/// CloudFlare range.
///
/// When the range cache cannot be populated the verdict is
/// [`Grade::Skipped`] — inconclusive, not negative — with the cache error
/// carried in the report.
pub struct CloudFlareStatusProbe {
    cache: Arc<RangeCache>,
}

impl CloudFlareStatusProbe {
    /// Probe over a specific cache (tests inject a mock source here).
    #[must_use]
    pub fn with_cache(cache: Arc<RangeCache>) -> Self {
        Self { cache }
    }
}

impl Default for CloudFlareStatusProbe {
    fn default() -> Self {
        Self {
            cache: Arc::clone(&SHARED_CACHE),
        }
    }
}

#[async_trait]
impl Probe for CloudFlareStatusProbe {
    fn name(&self) -> &'static str {
        "CloudFlareStatus"
    }

    fn description(&self) -> &'static str {
        "Host is on CloudFlare"
    }

    async fn run(&self, host: &str) -> ProbeResult<ProbeReport> {
        let nets = match self.cache.ranges().await {
            Ok(nets) => nets,
            Err(e) => {
                debug!("[CF] Range cache unavailable, skipping: {e}");
                return Ok(ProbeReport::skipped(e));
            }
        };

        let addrs = resolve_host(host).await?;
        let (grade, status) = membership(&addrs, &nets);

        Ok(ProbeReport {
            grade,
            output: Some(ProbeOutput::RangeMembership(status)),
            error: None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::join_all;

    use super::*;

    /// Mock HTTP collaborator counting fetches per document.
    struct MockSource {
        v4_body: String,
        v6_body: String,
        fail: bool,
        v4_calls: AtomicUsize,
        v6_calls: AtomicUsize,
    }

    impl MockSource {
        fn new(v4_body: &str, v6_body: &str) -> Arc<Self> {
            Arc::new(Self {
                v4_body: v4_body.to_string(),
                v6_body: v6_body.to_string(),
                fail: false,
                v4_calls: AtomicUsize::new(0),
                v6_calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                v4_body: String::new(),
                v6_body: String::new(),
                fail: true,
                v4_calls: AtomicUsize::new(0),
                v6_calls: AtomicUsize::new(0),
            })
        }

        fn fetch_counts(&self) -> (usize, usize) {
            (
                self.v4_calls.load(Ordering::SeqCst),
                self.v6_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl RangeSource for MockSource {
        async fn fetch(&self, url: &str) -> ProbeResult<String> {
            let (counter, body) = if url.ends_with("v4") {
                (&self.v4_calls, &self.v4_body)
            } else {
                (&self.v6_calls, &self.v6_body)
            };
            counter.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProbeError::RangeFetch("mock transport failure".to_string()));
            }
            Ok(body.clone())
        }
    }

    fn cache_over(source: Arc<MockSource>) -> RangeCache {
        RangeCache::new(source, "mock://ips-v4", "mock://ips-v6")
    }

    // ==================== RangeCache tests ====================

    #[tokio::test]
    async fn test_populates_and_merges_both_documents() {
        let source = MockSource::new("1.1.1.0/24\n104.16.0.0/13", "2606:4700::/32");
        let cache = cache_over(Arc::clone(&source));

        let nets = cache.ranges().await.unwrap();
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[0].to_string(), "1.1.1.0/24");
        assert_eq!(nets[2].to_string(), "2606:4700::/32");

        // Second call is served from cache.
        let again = cache.ranges().await.unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(source.fetch_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_concurrent_first_use_fetches_each_document_once() {
        let source = MockSource::new("1.1.1.0/24", "2606:4700::/32");
        let cache = Arc::new(cache_over(Arc::clone(&source)));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ranges().await })
            })
            .collect();

        for joined in join_all(tasks).await {
            let nets = joined.unwrap().unwrap();
            assert_eq!(nets.len(), 2);
        }
        assert_eq!(source.fetch_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_memoized() {
        let source = MockSource::failing();
        let cache = cache_over(Arc::clone(&source));

        let first = cache.ranges().await.unwrap_err();
        assert!(matches!(first, ProbeError::RangeFetch(_)));

        // Same remembered error, no second fetch, second document never tried.
        let second = cache.ranges().await.unwrap_err();
        assert_eq!(first, second);
        assert_eq!(source.fetch_counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_malformed_cidr_fails_whole_attempt() {
        let source = MockSource::new("1.1.1.0/24\nnot-a-cidr", "2606:4700::/32");
        let cache = cache_over(Arc::clone(&source));

        let first = cache.ranges().await.unwrap_err();
        assert!(matches!(first, ProbeError::RangeParse(_)));

        // The failure is terminal: no partial list, no re-download.
        let second = cache.ranges().await.unwrap_err();
        assert_eq!(first, second);
        assert_eq!(source.fetch_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_empty_document_contributes_no_ranges() {
        let source = MockSource::new("", "2606:4700::/32");
        let nets = cache_over(source).ranges().await.unwrap();
        assert_eq!(nets.len(), 1);
    }

    #[tokio::test]
    async fn test_two_empty_documents_yield_empty_cache() {
        let source = MockSource::new("", "");
        let nets = cache_over(source).ranges().await.unwrap();
        assert!(nets.is_empty());
    }

    // ==================== membership tests ====================

    #[test]
    fn test_membership_reports_every_address() {
        let nets = vec!["1.1.1.0/24".parse::<IpNetwork>().unwrap()];
        let addrs = vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()];

        let (grade, status) = membership(&addrs, &nets);
        assert_eq!(grade, Grade::Bad);
        assert_eq!(status.get("1.1.1.1"), Some(&true));
        assert_eq!(status.get("8.8.8.8"), Some(&false));
        assert_eq!(status.len(), 2);
    }

    #[test]
    fn test_membership_all_in_range_is_good() {
        let nets = vec![
            "1.1.1.0/24".parse::<IpNetwork>().unwrap(),
            "2606:4700::/32".parse::<IpNetwork>().unwrap(),
        ];
        let addrs = vec!["1.1.1.1".to_string(), "2606:4700::1111".to_string()];

        let (grade, status) = membership(&addrs, &nets);
        assert_eq!(grade, Grade::Good);
        assert!(status.values().all(|&in_range| in_range));
    }

    #[test]
    fn test_membership_unparseable_address_counts_as_out_of_range() {
        let nets = vec!["1.1.1.0/24".parse::<IpNetwork>().unwrap()];
        let addrs = vec!["not-an-ip".to_string()];

        let (grade, status) = membership(&addrs, &nets);
        assert_eq!(grade, Grade::Bad);
        assert_eq!(status.get("not-an-ip"), Some(&false));
    }

    // ==================== probe tests ====================

    #[tokio::test]
    async fn test_probe_skips_when_cache_fails() {
        let source = MockSource::failing();
        let probe = CloudFlareStatusProbe::with_cache(Arc::new(cache_over(Arc::clone(&source))));

        let first = probe.run("example.com").await.unwrap();
        assert_eq!(first.grade, Grade::Skipped);
        assert!(first.output.is_none());
        assert!(matches!(first.error, Some(ProbeError::RangeFetch(_))));

        // Every later run skips with the same remembered error.
        let second = probe.run("example.com").await.unwrap();
        assert_eq!(second.grade, Grade::Skipped);
        assert_eq!(first.error, second.error);
        assert_eq!(source.fetch_counts(), (1, 0));
    }

    #[tokio::test]
    async fn test_probe_propagates_invalid_host_after_cache_is_populated() {
        let source = MockSource::new("1.1.1.0/24", "");
        let probe = CloudFlareStatusProbe::with_cache(Arc::new(cache_over(source)));

        let result = probe.run("host:::bad").await;
        assert!(matches!(result, Err(ProbeError::InvalidHost(_))));
    }

    // NOTE: These tests depend on external networks; failures may be due to firewall/proxy issues

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_probe_against_real_cloudflare_host() {
        let probe = CloudFlareStatusProbe::default();
        let report = probe
            .run("www.cloudflare.com")
            .await
            .unwrap_or_else(|e| panic!("CloudFlare status probe failed: {e}"));
        assert_eq!(report.grade, Grade::Good);
        match report.output {
            Some(ProbeOutput::RangeMembership(status)) => {
                assert!(!status.is_empty());
                assert!(status.values().all(|&in_range| in_range));
            }
            other => panic!("expected membership output, got {other:?}"),
        }
    }
}
