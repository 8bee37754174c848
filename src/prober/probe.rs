//! Single-request latency probes
//!
//! A [`Probe`] issues exactly one request and reports how long the target
//! took to answer. It never retries; the caller decides what a failure means.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::utils::error::ProbeError;

/// Measures the latency of one endpoint
#[async_trait]
pub trait Probe: Send + Sync {
    /// Issue one request to `url` and return the elapsed time until it answered
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError>;
}

/// HTTP probe timing a plain GET until the response headers arrive
///
/// Any HTTP response counts as reachable, whatever its status code.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Create a probe whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns `ProbeError::Http` if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("worldping/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError> {
        let target =
            url::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{url}: {e}")))?;

        let started = Instant::now();
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(ProbeError::from_reqwest)?;
        let elapsed = started.elapsed();

        tracing::trace!(url, status = response.status().as_u16(), "Probe answered");
        Ok(elapsed)
    }
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// Scripted probe for tests and dry runs
///
/// Returns a configured latency per URL (or a default), fails the URLs it is
/// told to fail, and records how many probes overlapped.
pub struct MockProbe {
    default_latency: Duration,
    latencies: HashMap<String, Duration>,
    failures: HashMap<String, ProbeFailure>,
    hold: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

/// Failure a [`MockProbe`] simulates for a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    Timeout,
    InvalidUrl,
}

impl MockProbe {
    /// Every probe succeeds with `latency` unless scripted otherwise
    pub fn succeeding(latency: Duration) -> Self {
        Self {
            default_latency: latency,
            latencies: HashMap::new(),
            failures: HashMap::new(),
            hold: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Report `latency` for `url`
    pub fn with_latency(mut self, url: impl Into<String>, latency: Duration) -> Self {
        self.latencies.insert(url.into(), latency);
        self
    }

    /// Fail every probe of `url` as a timeout
    pub fn with_timeout(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into(), ProbeFailure::Timeout);
        self
    }

    /// Fail every probe of `url` with the given failure
    pub fn with_failure(mut self, url: impl Into<String>, failure: ProbeFailure) -> Self {
        self.failures.insert(url.into(), failure);
        self
    }

    /// Sleep this long inside each probe before answering
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Number of probes issued
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of probes observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// URLs probed, in call order
    pub fn probed_urls(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Probe for MockProbe {
    async fn probe(&self, url: &str) -> Result<Duration, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(url.to_string());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failures.get(url) {
            Some(ProbeFailure::Timeout) => Err(ProbeError::Timeout),
            Some(ProbeFailure::InvalidUrl) => Err(ProbeError::InvalidUrl(url.to_string())),
            None => Ok(self
                .latencies
                .get(url)
                .copied()
                .unwrap_or(self.default_latency)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_probe_scripting() {
        let probe = MockProbe::succeeding(Duration::from_millis(100))
            .with_latency("http://a/", Duration::from_millis(420))
            .with_timeout("http://b/");

        assert_eq!(probe.probe("http://a/").await.unwrap(), Duration::from_millis(420));
        assert!(matches!(probe.probe("http://b/").await, Err(ProbeError::Timeout)));
        assert_eq!(probe.probe("http://c/").await.unwrap(), Duration::from_millis(100));
        assert_eq!(probe.calls(), 3);
        assert_eq!(probe.probed_urls(), vec!["http://a/", "http://b/", "http://c/"]);
    }

    #[tokio::test]
    async fn test_http_probe_rejects_invalid_url() {
        let probe = HttpProbe::new(Duration::from_secs(1)).unwrap();
        let result = probe.probe("not a url").await;
        assert!(matches!(result, Err(ProbeError::InvalidUrl(_))));
    }
}
