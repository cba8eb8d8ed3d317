//! Archive download.
//!
//! The service never talks to the network directly; it asks an
//! [`ArchiveFetcher`] for the bytes behind a URL. [`HttpFetcher`] is the
//! default implementation (feature `download`). Tests and offline setups plug
//! in their own.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Default timeout for HTTP requests in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Maximum redirect hops followed per request.
pub const MAX_REDIRECTS: usize = 10;

/// Retrieves archive bytes by URL.
pub trait ArchiveFetcher: Send + Sync + fmt::Debug {
    /// Fetch the full body of `url`.
    ///
    /// `timeout` overrides the fetcher's default for this request; the service
    /// passes the time left before a caller's deadline.
    fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>>;
}

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Redirect hops followed before giving up.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: concat!("demfetch/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: MAX_REDIRECTS,
        }
    }
}

impl FetchConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(feature = "download")]
pub use client::HttpFetcher;

#[cfg(feature = "download")]
mod client {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::redirect::Policy;

    use super::{ArchiveFetcher, FetchConfig};
    use crate::error::{DemError, Result};

    /// Blocking HTTP fetcher built on reqwest.
    ///
    /// Redirects are followed up to [`FetchConfig::max_redirects`] hops. URLs
    /// are sent as given; no retries are attempted.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
        config: FetchConfig,
    }

    impl HttpFetcher {
        /// Create a new fetcher with the given configuration.
        pub fn new(config: FetchConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .user_agent(config.user_agent.clone())
                .redirect(Policy::limited(config.max_redirects))
                .build()
                .map_err(|e| DemError::Fetch {
                    url: String::new(),
                    reason: format!("Failed to create HTTP client: {}", e),
                })?;

            Ok(Self { client, config })
        }

        /// The configuration this fetcher was built with.
        pub fn config(&self) -> &FetchConfig {
            &self.config
        }
    }

    impl ArchiveFetcher for HttpFetcher {
        fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
            let mut request = self.client.get(url);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            tracing::info!(url = %url, "Downloading archive");
            let response = request.send()?;

            if !response.status().is_success() {
                return Err(DemError::Fetch {
                    url: url.to_string(),
                    reason: format!("HTTP {}", response.status()),
                });
            }

            let bytes = response.bytes()?;
            tracing::debug!(url = %url, bytes = bytes.len(), "Download complete");
            Ok(bytes.to_vec())
        }
    }

}
