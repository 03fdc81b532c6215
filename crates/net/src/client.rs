//! HTTP client with connection pooling
//!
//! The client performs single requests; retry policy lives in the
//! downloader so it can resume partial files between attempts.

use reqwest::{header, Client, Response};
use std::time::Duration;
use yama_errors::{Error, NetworkError};

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Upper bound for one request including its body
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            user_agent: format!("yama/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client wrapper
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: &NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue a GET, asking for the suffix starting at `range_start` when given
    ///
    /// Any HTTP status is returned as a response; only transport failures
    /// are errors.
    ///
    /// # Errors
    ///
    /// Returns `Timeout`, `ConnectionFailed` or `DownloadFailed` for transport errors.
    pub async fn get(&self, url: &str, range_start: Option<u64>) -> Result<Response, Error> {
        let mut request = self.client.get(url);
        if let Some(offset) = range_start {
            request = request.header(header::RANGE, format!("bytes={offset}-"));
        }
        request.send().await.map_err(|e| map_reqwest_error(url, &e))
    }
}

/// Classify a reqwest failure into the network error taxonomy
pub(crate) fn map_reqwest_error(url: &str, error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
        .into()
    } else if error.is_connect() {
        NetworkError::ConnectionFailed(error.to_string()).into()
    } else {
        NetworkError::DownloadFailed(error.to_string()).into()
    }
}
