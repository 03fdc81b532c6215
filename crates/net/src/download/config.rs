//! Configuration structures for package downloads

use std::path::PathBuf;
use std::time::Duration;
use yama_events::EventSender;
use yama_hash::{Hash, HashAlgorithm};
use yama_types::CancellationToken;

/// Configuration for package downloads
#[derive(Clone, Debug)]
pub struct PackageDownloadConfig {
    /// Maximum file size allowed (default: 2GB)
    pub max_file_size: u64,
    /// Buffer size for local file copies (default: 128KB)
    pub buffer_size: usize,
    pub retry_config: RetryConfig,
    /// Longest stall allowed between body chunks (default: 30s)
    pub chunk_timeout: Duration,
    /// Limit for a single attempt, connect to last byte (default: 5m)
    pub attempt_timeout: Duration,
    /// Limit for the whole fetch including backoff sleeps (default: 10m)
    pub fetch_timeout: Duration,
    pub connect_timeout: Duration,
    /// Partial files smaller than this are discarded rather than resumed
    pub min_resume_bytes: u64,
    pub user_agent: String,
}

impl Default for PackageDownloadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 2 * 1024 * 1024 * 1024, // 2GB
            buffer_size: 128 * 1024,               // 128KB
            retry_config: RetryConfig::default(),
            chunk_timeout: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(30),
            min_resume_bytes: 64 * 1024,
            user_agent: format!("yama/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PackageDownloadConfig {
    /// Build from the `[network]` section of the configuration file
    #[must_use]
    pub fn from_config(network: &yama_config::NetworkConfig) -> Self {
        Self {
            max_file_size: network.max_file_size,
            retry_config: RetryConfig {
                max_retries: network.retries,
                initial_delay: Duration::from_millis(network.initial_delay_ms),
                max_delay: Duration::from_millis(network.max_delay_ms),
                backoff_multiplier: network.backoff_multiplier,
                jitter_factor: network.jitter_factor,
            },
            chunk_timeout: network.chunk_timeout(),
            attempt_timeout: network.attempt_timeout(),
            fetch_timeout: network.fetch_timeout(),
            connect_timeout: Duration::from_secs(network.connect_timeout),
            min_resume_bytes: network.min_resume_bytes,
            user_agent: network.user_agent.clone(),
            ..Self::default()
        }
    }
}

/// Retry configuration for downloads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Per-fetch inputs that are not part of the downloader configuration
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Algorithm used for the digest computed while streaming
    pub algorithm: HashAlgorithm,
    /// Package name for events
    pub package: Option<String>,
    pub cancel: CancellationToken,
    pub events: Option<EventSender>,
}

/// A fully downloaded archive waiting for verification
#[derive(Debug, Clone)]
pub struct StagedArchive {
    pub local_path: PathBuf,
    pub byte_size: u64,
    /// Digest of the whole file, computed while streaming
    pub digest: Hash,
}

/// Parameters for one streamed response body
pub(super) struct StreamParams<'a> {
    pub url: &'a str,
    /// Size of the complete file if the server declared one
    pub expected_total: Option<u64>,
    pub cancel: &'a CancellationToken,
}
