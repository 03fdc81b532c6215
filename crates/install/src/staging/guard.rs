//! Directory guard that removes its directory unless told otherwise

use std::path::{Path, PathBuf};
use yama_errors::Error;

/// A directory owned by one install attempt
///
/// Call `cleanup` on the normal path to observe removal errors. If the
/// guard is dropped while still armed (panic, early return, aborted task)
/// the directory is removed synchronously in `Drop`.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    armed: bool,
}

impl ScopedDir {
    /// Create the directory (and parents) and take ownership of it
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        Ok(Self { path, armed: true })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now; a directory already gone counts as removed
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails.
    pub async fn cleanup(mut self) -> Result<(), Error> {
        self.armed = false;
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}
