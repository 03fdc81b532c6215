//! Main downloader orchestration and `PackageDownloader` implementation

use super::config::{FetchOptions, PackageDownloadConfig, StagedArchive, StreamParams};
use super::resume::{discard_partial, get_resume_offset, hash_existing_prefix, partial_path};
use super::retry::{is_transient, next_delay};
use super::stream::{copy_local_file, open_partial, stream_download};
use super::validation::{classify_response, supports_ranges, validate_url, BodyMode};
use crate::client::{NetClient, NetConfig};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Instant;
use tokio::fs as tokio_fs;
use url::Url;
use yama_errors::{Error, NetworkError};
use yama_events::{AppEvent, DownloadEvent, EventEmitter, FailureContext};
use yama_hash::Hasher;

/// A streaming package downloader with resumable capabilities
#[derive(Debug, Clone)]
pub struct PackageDownloader {
    config: PackageDownloadConfig,
    client: NetClient,
}

impl PackageDownloader {
    /// Create a new package downloader
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: PackageDownloadConfig) -> Result<Self, Error> {
        let net_config = NetConfig {
            timeout: config.attempt_timeout,
            connect_timeout: config.connect_timeout,
            user_agent: config.user_agent.clone(),
            ..NetConfig::default()
        };

        let client = NetClient::new(&net_config)?;

        Ok(Self { config, client })
    }

    /// Fetch `url` into `target`
    ///
    /// The body is streamed into a `.part` sibling of `target` and renamed
    /// into place once complete. Transient failures are retried with
    /// backoff, resuming the partial file when the server honours ranges.
    /// On failure neither `target` nor the partial file is left behind.
    ///
    /// # Errors
    ///
    /// Returns a `NetworkError` (connection, HTTP status, timeout, size),
    /// an I/O error from the staging filesystem, or `Error::Cancelled`.
    pub async fn fetch(
        &self,
        url: &str,
        target: &Path,
        options: &FetchOptions,
    ) -> Result<StagedArchive, Error> {
        let start = Instant::now();
        let part = partial_path(target);

        let result = match tokio::time::timeout(
            self.config.fetch_timeout,
            self.fetch_with_retries(url, target, &part, options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NetworkError::Timeout {
                url: url.to_string(),
            }
            .into()),
        };

        match result {
            Ok(staged) => {
                options.events.emit(AppEvent::Download(DownloadEvent::Completed {
                    url: url.to_string(),
                    package: options.package.clone(),
                    final_size: staged.byte_size,
                    total_time: start.elapsed(),
                    digest: staged.digest.to_string(),
                }));
                Ok(staged)
            }
            Err(e) => {
                // Cleanup is best effort; the fetch error is what the caller needs
                let _ = discard_partial(&part).await;
                if !e.is_cancelled() {
                    options.events.emit(AppEvent::Download(DownloadEvent::Failed {
                        url: url.to_string(),
                        package: options.package.clone(),
                        failure: FailureContext::from_error(&e),
                    }));
                }
                Err(e)
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        url: &str,
        target: &Path,
        part: &Path,
        options: &FetchOptions,
    ) -> Result<StagedArchive, Error> {
        let parsed = validate_url(url)?;
        if let Some(parent) = target.parent() {
            tokio_fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let retry = &self.config.retry_config;
        let max_attempts = retry.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if options.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = match tokio::time::timeout(
                self.config.attempt_timeout,
                self.try_fetch(&parsed, target, part, attempt, options),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(NetworkError::Timeout {
                    url: url.to_string(),
                }
                .into()),
            };

            let error = match outcome {
                Ok(staged) => return Ok(staged),
                Err(e) => e,
            };

            if error.is_cancelled() || !is_transient(&error) || attempt >= max_attempts {
                return Err(error);
            }

            let delay = next_delay(retry, attempt, &error);
            options.events.emit(AppEvent::Download(DownloadEvent::Retrying {
                url: url.to_string(),
                attempt: attempt + 1,
                max_attempts,
                reason: error.to_string(),
                backoff_delay: delay,
            }));

            tokio::select! {
                () = options.cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Attempt a single download, resuming the partial file when possible
    async fn try_fetch(
        &self,
        url: &Url,
        target: &Path,
        part: &Path,
        attempt: u32,
        options: &FetchOptions,
    ) -> Result<StagedArchive, Error> {
        if url.scheme() == "file" {
            return self.copy_from_file_url(url, target, part, options).await;
        }

        let url_str = url.as_str();
        let resume_offset = get_resume_offset(self.config.min_resume_bytes, part).await?;
        if resume_offset > 0 {
            options.events.emit(AppEvent::Download(DownloadEvent::Resuming {
                url: url_str.to_string(),
                resume_offset,
                attempt,
            }));
        }

        let range = (resume_offset > 0).then_some(resume_offset);
        let response = tokio::select! {
            () = options.cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url_str, range) => response?,
        };

        let mode = match classify_response(&response, resume_offset) {
            Ok(mode) => mode,
            Err(e) => {
                // Only a rejected or mismatched range makes the partial file
                // useless; server errors keep it for the next attempt
                let status = response.status();
                if resume_offset > 0
                    && (status == StatusCode::RANGE_NOT_SATISFIABLE
                        || status == StatusCode::PARTIAL_CONTENT)
                {
                    discard_partial(part).await?;
                }
                return Err(e);
            }
        };

        let body_len = response.content_length();
        let (start_offset, expected_total) = match mode {
            BodyMode::Append(offset) => (offset, body_len.map(|len| offset + len)),
            BodyMode::Fresh => (0, body_len),
        };

        if let Some(total) = expected_total {
            if total > self.config.max_file_size {
                return Err(NetworkError::FileSizeExceeded {
                    size: total,
                    limit: self.config.max_file_size,
                }
                .into());
            }
        }

        options.events.emit(AppEvent::Download(DownloadEvent::Started {
            url: url_str.to_string(),
            package: options.package.clone(),
            total_size: expected_total,
            supports_resume: supports_ranges(&response),
        }));

        let mut hasher = match mode {
            BodyMode::Append(offset) => {
                hash_existing_prefix(options.algorithm, part, offset, self.config.buffer_size)
                    .await?
            }
            BodyMode::Fresh => Hasher::new(options.algorithm),
        };
        let mut file = open_partial(part, matches!(mode, BodyMode::Append(_))).await?;

        let params = StreamParams {
            url: url_str,
            expected_total,
            cancel: &options.cancel,
        };
        let streamed = stream_download(
            response,
            &mut file,
            &mut hasher,
            self.config.chunk_timeout,
            self.config.max_file_size,
            start_offset,
            &params,
        )
        .await;
        drop(file);

        let written = match streamed {
            Ok(written) => written,
            Err(e @ Error::Network(NetworkError::ContentLengthMismatch { .. })) => {
                // The bytes on disk cannot be trusted as a prefix any more
                discard_partial(part).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        publish_partial(part, target, start_offset + written, hasher).await
    }

    async fn copy_from_file_url(
        &self,
        url: &Url,
        target: &Path,
        part: &Path,
        options: &FetchOptions,
    ) -> Result<StagedArchive, Error> {
        let source = url
            .to_file_path()
            .map_err(|()| NetworkError::InvalidUrl(url.to_string()))?;

        options.events.emit(AppEvent::Download(DownloadEvent::Started {
            url: url.to_string(),
            package: options.package.clone(),
            total_size: tokio_fs::metadata(&source).await.ok().map(|m| m.len()),
            supports_resume: false,
        }));

        let mut hasher = Hasher::new(options.algorithm);
        let mut file = open_partial(part, false).await?;
        let params = StreamParams {
            url: url.as_str(),
            expected_total: None,
            cancel: &options.cancel,
        };
        let written = copy_local_file(
            &source,
            &mut file,
            &mut hasher,
            self.config.buffer_size,
            self.config.max_file_size,
            &params,
        )
        .await?;
        drop(file);

        publish_partial(part, target, written, hasher).await
    }
}

/// Rename the completed partial file onto the target
async fn publish_partial(
    part: &Path,
    target: &Path,
    byte_size: u64,
    hasher: Hasher,
) -> Result<StagedArchive, Error> {
    tokio_fs::rename(part, target)
        .await
        .map_err(|e| Error::io_with_path(&e, target))?;

    Ok(StagedArchive {
        local_path: target.to_path_buf(),
        byte_size,
        digest: hasher.finalize(),
    })
}
