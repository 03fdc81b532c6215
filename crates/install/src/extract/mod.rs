//! Archive extraction into a work directory
//!
//! Extraction runs on the blocking pool. The async side races it against
//! cancellation and the extraction timeout; either one raises an abort
//! flag the worker polls between entries and between buffers. Whatever the
//! outcome, a failed extraction leaves the work directory empty.

mod tarball;
pub(crate) mod writer;
mod zipfile;

pub use writer::TreeStats;

use crate::validation::{detect_format, ArchiveFormat};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use yama_errors::{Error, InstallError};
use yama_types::CancellationToken;

/// How long an aborted worker gets to notice the flag before the work
/// directory is cleared underneath it
const ABORT_GRACE: Duration = Duration::from_secs(5);

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const TIMED_OUT: u8 = 2;

#[derive(Debug, Clone, Default)]
pub(crate) struct AbortSignal(Arc<AtomicU8>);

impl AbortSignal {
    fn raise(&self, reason: u8) {
        let _ = self
            .0
            .compare_exchange(RUNNING, reason, Ordering::SeqCst, Ordering::SeqCst);
    }

    fn reason(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.reason() == RUNNING {
            Ok(())
        } else {
            Err(Error::Cancelled)
        }
    }
}

/// A fully extracted, not yet published tree
#[derive(Debug, Clone)]
pub struct ExtractedTree {
    pub root: PathBuf,
    pub format: ArchiveFormat,
    pub stats: TreeStats,
}

#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    timeout: Duration,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

impl ArchiveExtractor {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Extract `archive` into `work_dir`
    ///
    /// `work_dir` is created if missing and is expected to be empty. On
    /// success the returned tree is rooted at `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns `CorruptArchive` for unreadable or unsupported archives,
    /// `PathTraversal` for entries escaping the work directory,
    /// `ExtractionTimeout` when the timeout elapses, `Cancelled` when the
    /// token fires, and I/O errors (including disk full) from writing.
    pub async fn extract(
        &self,
        archive: &Path,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractedTree, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let abort = AbortSignal::default();
        let mut task = {
            let archive = archive.to_path_buf();
            let root = work_dir.to_path_buf();
            let abort = abort.clone();
            tokio::task::spawn_blocking(move || extract_blocking(&archive, &root, &abort))
        };

        let joined = tokio::select! {
            joined = &mut task => Some(joined),
            () = cancel.cancelled() => {
                abort.raise(CANCELLED);
                None
            }
            () = tokio::time::sleep(self.timeout) => {
                abort.raise(TIMED_OUT);
                None
            }
        };

        let result = if let Some(joined) = joined {
            joined.unwrap_or_else(|e| Err(Error::internal(format!("extraction task failed: {e}"))))
        } else {
            let _ = tokio::time::timeout(ABORT_GRACE, &mut task).await;
            if abort.reason() == TIMED_OUT {
                Err(InstallError::ExtractionTimeout {
                    seconds: self.timeout.as_secs(),
                }
                .into())
            } else {
                Err(Error::Cancelled)
            }
        };

        match result {
            Ok((format, stats)) => Ok(ExtractedTree {
                root: work_dir.to_path_buf(),
                format,
                stats,
            }),
            Err(error) => {
                let root = work_dir.to_path_buf();
                // The original failure matters more than a cleanup failure;
                // the caller's scoped work directory removes any remains
                let _ = tokio::task::spawn_blocking(move || writer::clear_dir_contents(&root)).await;
                Err(error)
            }
        }
    }
}

fn extract_blocking(
    archive: &Path,
    root: &Path,
    abort: &AbortSignal,
) -> Result<(ArchiveFormat, TreeStats), Error> {
    let format = detect_format(archive)?;
    // A worker that only starts after an abort must not recreate the root
    abort.check()?;
    std::fs::create_dir_all(root).map_err(|e| Error::io_with_path(&e, root))?;

    let file = File::open(archive).map_err(|e| Error::io_with_path(&e, archive))?;
    let mut writer = writer::TreeWriter::new(root, abort);

    match format {
        ArchiveFormat::Tar => tarball::unpack(BufReader::new(file), &mut writer, archive)?,
        ArchiveFormat::TarGzip => {
            tarball::unpack(GzDecoder::new(BufReader::new(file)), &mut writer, archive)?;
        }
        ArchiveFormat::TarZstd => {
            let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| {
                Error::from(InstallError::CorruptArchive {
                    path: archive.display().to_string(),
                    message: e.to_string(),
                })
            })?;
            tarball::unpack(decoder, &mut writer, archive)?;
        }
        ArchiveFormat::Zip => zipfile::unpack(file, &mut writer, archive)?,
    }

    Ok((format, writer.finish()?))
}
