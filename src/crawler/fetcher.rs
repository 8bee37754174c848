//! HTTP fetcher for the world directory page
//!
//! This module provides the directory fetcher with:
//! - User-Agent rotation
//! - Rate limiting with governor
//! - A bounded request timeout
//!
//! Fetch failures are never fatal to a batch: [`DirectoryFetcher::fetch_endpoint_records`]
//! logs them and hands back an empty record set.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::DirectoryConfig;
use crate::models::EndpointRecord;
use crate::parser::DirectoryParser;
use crate::utils::error::FetchError;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// World directory fetcher
pub struct DirectoryFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Directory page URL
    directory_url: String,

    /// Fixed user agent overriding the rotation pool
    user_agent: Option<String>,

    parser: DirectoryParser,
}

impl DirectoryFetcher {
    /// Create a fetcher from directory configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the directory URL does not parse and
    /// `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &DirectoryConfig) -> Result<Self, FetchError> {
        let mut fetcher = Self::with_config(
            &config.url,
            config.rate_limit,
            config.request_timeout(),
        )?;
        fetcher.user_agent = config.user_agent.clone();
        Ok(fetcher)
    }

    /// Create a fetcher with explicit settings
    ///
    /// # Arguments
    ///
    /// * `directory_url` - URL of the server list page
    /// * `requests_per_second` - Maximum number of requests per second
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` or `FetchError::Http`
    pub fn with_config(
        directory_url: &str,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        url::Url::parse(directory_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{directory_url}: {e}")))?;

        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            directory_url: directory_url.to_string(),
            user_agent: None,
            parser: DirectoryParser::new(),
        })
    }

    /// Directory page URL this fetcher targets
    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// Fetch and parse the directory, absorbing every failure
    ///
    /// Returns an empty vector if the page is unreachable or unparsable.
    pub async fn fetch_endpoint_records(&self) -> Vec<EndpointRecord> {
        match self.try_fetch_endpoint_records().await {
            Ok(records) => {
                tracing::info!(
                    url = %self.directory_url,
                    worlds = records.len(),
                    "Fetched world directory"
                );
                records
            }
            Err(e) => {
                tracing::error!(
                    url = %self.directory_url,
                    error = %e,
                    "Error getting world list"
                );
                Vec::new()
            }
        }
    }

    /// Fetch and parse the directory, surfacing the failure
    ///
    /// # Errors
    ///
    /// Returns `FetchError` on network failure, non-success status, or a page
    /// without a server list
    pub async fn try_fetch_endpoint_records(&self) -> Result<Vec<EndpointRecord>, FetchError> {
        let html = self.fetch_html(&self.directory_url).await?;
        Ok(self.parser.parse(&html)?)
    }

    /// Fetch a page as text, honouring the rate limit
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Timeout`, `FetchError::ServerError` or `FetchError::Http`
    pub async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        tracing::debug!(url = %url, "Fetching directory page");

        let response = self
            .client
            .get(url)
            .headers(self.build_headers())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        response.text().await.map_err(classify)
    }

    /// Build HTTP headers for directory requests
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let agent = match &self.user_agent {
            Some(agent) => HeaderValue::from_str(agent).ok(),
            None => None,
        };
        headers.insert(
            USER_AGENT,
            agent.unwrap_or_else(|| HeaderValue::from_static(self.random_user_agent())),
        );

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));

        headers
    }

    /// Get a random user agent from the pool
    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> DirectoryFetcher {
        DirectoryFetcher::new(&DirectoryConfig::default()).unwrap()
    }

    #[test]
    fn test_user_agent_rotation() {
        let fetcher = fetcher();

        let mut agents = std::collections::HashSet::new();
        for _ in 0..100 {
            let agent = fetcher.random_user_agent();
            assert!(USER_AGENTS.contains(&agent));
            agents.insert(agent);
        }

        assert!(agents.len() > 1, "User agents should rotate");
    }

    #[test]
    fn test_fixed_user_agent() {
        let config = DirectoryConfig {
            user_agent: Some("worldping-test/1.0".to_string()),
            ..DirectoryConfig::default()
        };
        let fetcher = DirectoryFetcher::new(&config).unwrap();
        let headers = fetcher.build_headers();
        assert_eq!(headers.get(USER_AGENT).unwrap(), "worldping-test/1.0");
        assert!(headers.contains_key(ACCEPT));
    }

    #[test]
    fn test_invalid_directory_url() {
        let result = DirectoryFetcher::with_config("not a url", 1, Duration::from_secs(1));
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_fetcher_creation() {
        let fetcher = fetcher();
        assert_eq!(fetcher.directory_url(), "http://oldschool.runescape.com/slu");
    }
}
