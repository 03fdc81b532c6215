//! Integrity verification of staged archives

use crate::{Hash, Hasher, CHUNK_SIZE};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use yama_errors::{Error, InstallError};
use yama_types::CancellationToken;

/// Checks a file on disk against an expected digest
///
/// The file is opened read-only and streamed in fixed-size chunks; it is
/// never modified. The algorithm is taken from the expected digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compute the digest of `path` with the algorithm of `expected`
    ///
    /// Cancellation is checked before every chunk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read, or
    /// `Error::Cancelled` once `cancel` fires.
    pub async fn digest(
        &self,
        path: &Path,
        expected: &Hash,
        cancel: &CancellationToken,
    ) -> Result<Hash, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        let mut hasher = Hasher::new(expected.algorithm());
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize())
    }

    /// Verify that `path` hashes to `expected`
    ///
    /// Every byte of the digest is compared.
    ///
    /// # Errors
    /// Returns `InstallError::DigestMismatch` when the digests differ,
    /// `Error::Cancelled` when `cancel` fires, or an I/O error if the file
    /// cannot be read.
    pub async fn verify(
        &self,
        path: &Path,
        expected: &Hash,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let actual = self.digest(path, expected, cancel).await?;
        if actual.as_bytes() == expected.as_bytes() {
            Ok(())
        } else {
            Err(InstallError::DigestMismatch {
                path: path.display().to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
            .into())
        }
    }
}
