//! Resumable download logic for package downloads

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tokio::io::AsyncReadExt;
use yama_config::constants::PARTIAL_SUFFIX;
use yama_errors::Error;
use yama_hash::{HashAlgorithm, Hasher};

/// Sibling file that holds the in-progress body for `target`
pub(super) fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(|| OsString::from("download"), ToOwned::to_owned);
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    target.with_file_name(name)
}

/// Get the offset for resuming a download
///
/// Partial files below `min_resume_bytes` are discarded; re-requesting a
/// few bytes costs less than a range round trip.
///
/// # Errors
///
/// Returns an error if the partial file exists but cannot be removed.
pub(super) async fn get_resume_offset(min_resume_bytes: u64, part_path: &Path) -> Result<u64, Error> {
    match tokio_fs::metadata(part_path).await {
        Ok(metadata) if metadata.is_file() => {
            let size = metadata.len();
            if size > 0 && size >= min_resume_bytes {
                Ok(size)
            } else {
                discard_partial(part_path).await?;
                Ok(0)
            }
        }
        Ok(_) | Err(_) => Ok(0),
    }
}

/// Remove a partial file, ignoring one that does not exist
pub(super) async fn discard_partial(part_path: &Path) -> Result<(), Error> {
    match tokio_fs::remove_file(part_path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io_with_path(&e, part_path)),
    }
}

/// Hash the first `bytes` of an existing partial file
pub(super) async fn hash_existing_prefix(
    algorithm: HashAlgorithm,
    part_path: &Path,
    bytes: u64,
    buffer_size: usize,
) -> Result<Hasher, Error> {
    let mut file = tokio_fs::File::open(part_path)
        .await
        .map_err(|e| Error::io_with_path(&e, part_path))?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0; buffer_size.max(1)];
    let mut remaining = bytes;

    while remaining > 0 {
        let to_read =
            usize::try_from(std::cmp::min(buffer.len() as u64, remaining)).unwrap_or(buffer.len());
        let bytes_read = file.read(&mut buffer[..to_read]).await?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
        remaining -= bytes_read as u64;
    }

    Ok(hasher)
}
