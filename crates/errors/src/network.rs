//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download interrupted: {0}")]
    DownloadFailed(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("rate limited by server")]
    RateLimited { retry_after: Option<u64> },

    #[error("content length mismatch: expected {expected} bytes, received {actual}")]
    ContentLengthMismatch { expected: u64, actual: u64 },

    #[error("server rejected range request starting at byte {offset}")]
    RangeNotSatisfiable { offset: u64 },

    #[error("file size {size} exceeds limit {limit}")]
    FileSizeExceeded { size: u64, limit: u64 },
}

impl NetworkError {
    /// Whether the status code describes a transient server condition
    #[must_use]
    pub fn is_transient_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed(_) => {
                Some("Check your network connection and retry.")
            }
            Self::RateLimited { .. } => Some("Wait a moment before retrying the download."),
            Self::UnsupportedProtocol { .. } | Self::InvalidUrl(_) => {
                Some("Use an http, https or file URL.")
            }
            Self::FileSizeExceeded { .. } => {
                Some("Raise `network.max_file_size` in the configuration if the archive is expected to be this large.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::DownloadFailed(_)
            | Self::ConnectionFailed(_)
            | Self::RateLimited { .. }
            | Self::ContentLengthMismatch { .. }
            | Self::RangeNotSatisfiable { .. } => true,
            Self::HttpError { status, .. } => Self::is_transient_status(*status),
            Self::InvalidUrl(_) | Self::UnsupportedProtocol { .. } | Self::FileSizeExceeded { .. } => {
                false
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionFailed(_) => "network.connection_failed",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::UnsupportedProtocol { .. } => "network.unsupported_protocol",
            Self::HttpError { .. } => "network.http_error",
            Self::RateLimited { .. } => "network.rate_limited",
            Self::ContentLengthMismatch { .. } => "network.content_length_mismatch",
            Self::RangeNotSatisfiable { .. } => "network.range_not_satisfiable",
            Self::FileSizeExceeded { .. } => "network.file_size_exceeded",
        };
        Some(code)
    }
}
