//! Low-level streaming download mechanics

use super::config::StreamParams;
use crate::client::map_reqwest_error;
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use yama_errors::{Error, NetworkError};
use yama_hash::Hasher;

/// Open the partial file for writing at the right position
pub(super) async fn open_partial(part_path: &Path, append: bool) -> Result<File, Error> {
    let mut options = OpenOptions::new();
    options.create(true).write(true);
    if append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options
        .open(part_path)
        .await
        .map_err(|e| Error::io_with_path(&e, part_path))
}

/// Stream a response body into `file`, feeding `hasher`
///
/// Returns the number of body bytes written. The file is flushed on every
/// exit path so a later attempt can resume from what reached the disk.
pub(super) async fn stream_download(
    response: reqwest::Response,
    file: &mut File,
    hasher: &mut Hasher,
    chunk_timeout: Duration,
    max_file_size: u64,
    start_offset: u64,
    params: &StreamParams<'_>,
) -> Result<u64, Error> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    let result = loop {
        let next = tokio::select! {
            biased;
            () = params.cancel.cancelled() => break Err(Error::Cancelled),
            next = tokio::time::timeout(chunk_timeout, stream.next()) => next,
        };

        let chunk: Bytes = match next {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(e))) => break Err(map_reqwest_error(params.url, &e)),
            Ok(None) => break Ok(written),
            Err(_) => {
                break Err(NetworkError::Timeout {
                    url: params.url.to_string(),
                }
                .into())
            }
        };

        let total = start_offset + written + chunk.len() as u64;
        if total > max_file_size {
            break Err(NetworkError::FileSizeExceeded {
                size: total,
                limit: max_file_size,
            }
            .into());
        }

        if let Err(e) = file.write_all(&chunk).await {
            break Err(e.into());
        }
        hasher.update(&chunk);
        written += chunk.len() as u64;
    };

    let flushed = file.flush().await;
    let written = result?;
    flushed?;

    if let Some(expected) = params.expected_total {
        let actual = start_offset + written;
        if actual != expected {
            return Err(NetworkError::ContentLengthMismatch { expected, actual }.into());
        }
    }

    Ok(written)
}

/// Copy a local `file://` source into the partial file
pub(super) async fn copy_local_file(
    source: &Path,
    file: &mut File,
    hasher: &mut Hasher,
    buffer_size: usize,
    max_file_size: u64,
    params: &StreamParams<'_>,
) -> Result<u64, Error> {
    let mut input = File::open(source)
        .await
        .map_err(|e| Error::io_with_path(&e, source))?;
    let mut buffer = vec![0; buffer_size.max(1)];
    let mut written = 0u64;

    loop {
        if params.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let n = input
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io_with_path(&e, source))?;
        if n == 0 {
            break;
        }
        written += n as u64;
        if written > max_file_size {
            return Err(NetworkError::FileSizeExceeded {
                size: written,
                limit: max_file_size,
            }
            .into());
        }
        file.write_all(&buffer[..n]).await?;
        hasher.update(&buffer[..n]);
    }

    file.flush().await?;
    Ok(written)
}
