//! URL validation and HTTP response classification for downloads

use reqwest::{header, Response, StatusCode};
use url::Url;
use yama_errors::{Error, NetworkError};

/// How a response body relates to the partial file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BodyMode {
    /// Body is the whole file; truncate the partial file
    Fresh,
    /// Body continues the partial file at this offset
    Append(u64),
}

/// Validate URL and check for supported protocols
pub(super) fn validate_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" | "file" => Ok(parsed),
        scheme => Err(NetworkError::UnsupportedProtocol {
            protocol: scheme.to_string(),
        }
        .into()),
    }
}

/// Decide what to do with a response to a request resumed at `resume_offset`
///
/// A 206 is only accepted when its `Content-Range` starts exactly at the
/// requested offset; a 200 means the server ignored the range.
pub(super) fn classify_response(response: &Response, resume_offset: u64) -> Result<BodyMode, Error> {
    let status = response.status();

    if status == StatusCode::PARTIAL_CONTENT {
        let start = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_start);
        return match start {
            Some(start) if resume_offset > 0 && start == resume_offset => {
                Ok(BodyMode::Append(resume_offset))
            }
            _ => Err(NetworkError::DownloadFailed(format!(
                "unexpected partial response for offset {resume_offset}"
            ))
            .into()),
        };
    }

    if status.is_success() {
        return Ok(BodyMode::Fresh);
    }

    if status == StatusCode::RANGE_NOT_SATISFIABLE && resume_offset > 0 {
        return Err(NetworkError::RangeNotSatisfiable {
            offset: resume_offset,
        }
        .into());
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        return Err(NetworkError::RateLimited { retry_after }.into());
    }

    Err(NetworkError::HttpError {
        status: status.as_u16(),
        message: status.to_string(),
    }
    .into())
}

/// Whether the server advertises byte-range support
pub(super) fn supports_ranges(response: &Response) -> bool {
    response.status() == StatusCode::PARTIAL_CONTENT
        || response
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"))
}

/// First byte position of a `Content-Range: bytes start-end/total` value
fn content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}
