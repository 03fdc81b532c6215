//! Per-destination install locks
//!
//! At most one install may target a given destination at a time. Locks are
//! keyed by the lexically normalised absolute destination and are dropped
//! from the map once nobody holds or waits on them.

use crate::validation::normalize_path;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use yama_errors::{Error, InstallError};
use yama_types::{CancellationToken, LockMode};

#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

/// Held for the whole of an install; released on drop
#[derive(Debug)]
pub struct InstallLock {
    registry: LockRegistry,
    key: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstallLock {
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.key
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry.prune(&self.key);
    }
}

impl LockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `destination`
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInstalling` in fail-fast mode when the lock is held,
    /// or `Cancelled` if the token fires while waiting.
    pub async fn acquire(
        &self,
        destination: &Path,
        mode: LockMode,
        cancel: &CancellationToken,
    ) -> Result<InstallLock, Error> {
        let key = normalize_path(destination)?;
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match mode {
            LockMode::FailFast => match mutex.try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    self.prune(&key);
                    return Err(InstallError::AlreadyInstalling {
                        destination: key.display().to_string(),
                    }
                    .into());
                }
            },
            LockMode::Wait => {
                let acquired = tokio::select! {
                    guard = mutex.lock_owned() => Some(guard),
                    () = cancel.cancelled() => None,
                };
                if let Some(guard) = acquired {
                    guard
                } else {
                    self.prune(&key);
                    return Err(Error::Cancelled);
                }
            }
        };

        Ok(InstallLock {
            registry: self.clone(),
            key,
            guard: Some(guard),
        })
    }

    /// Whether an install currently holds the lock for `destination`
    #[must_use]
    pub fn is_locked(&self, destination: &Path) -> bool {
        let Ok(key) = normalize_path(destination) else {
            return false;
        };
        self.locks
            .get(&key)
            .is_some_and(|entry| entry.value().try_lock().is_err())
    }

    /// Number of destinations with a live lock entry
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn prune(&self, key: &Path) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
