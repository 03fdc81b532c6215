//! Bounded parallel installs
//!
//! Each package runs as its own task; a semaphore caps how many are in the
//! pipeline at once. A shared cancellation token stops everything: running
//! installs unwind through their own cleanup, queued ones report
//! `Cancelled` without touching the filesystem.

use crate::api::types::{InstallResult, PackageRef};
use crate::coordinator::InstallCoordinator;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use yama_config::resources_semaphore::{acquire_semaphore_permit, create_semaphore};
use yama_errors::Error;
use yama_types::CancellationToken;

#[derive(Debug, Clone)]
pub struct InstallPool {
    coordinator: Arc<InstallCoordinator>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl InstallPool {
    #[must_use]
    pub fn new(coordinator: Arc<InstallCoordinator>, pool_size: usize) -> Self {
        Self {
            coordinator,
            semaphore: create_semaphore(pool_size),
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned token, e.g. one wired to Ctrl-C
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token shared by every install started from this pool
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<InstallCoordinator> {
        &self.coordinator
    }

    /// Install every package, returning one result per input in input order
    pub async fn install_all(&self, packages: Vec<PackageRef>) -> Vec<InstallResult> {
        let total = packages.len();
        let mut slots: Vec<Option<InstallResult>> = (0..total).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, package) in packages.iter().cloned().enumerate() {
            let coordinator = Arc::clone(&self.coordinator);
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let queued = Instant::now();
                let permit = tokio::select! {
                    permit = acquire_semaphore_permit(semaphore, "package install") => permit,
                    () = cancel.cancelled() => {
                        return (index, InstallResult::cancelled(&package, queued.elapsed()));
                    }
                };
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(error) => {
                        return (index, InstallResult::failed(&package, &error, queued.elapsed()));
                    }
                };
                if cancel.is_cancelled() {
                    return (index, InstallResult::cancelled(&package, queued.elapsed()));
                }
                let result = coordinator.install_with_cancel(&package, &cancel).await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, result)) = joined {
                slots[index] = Some(result);
            }
        }

        // A slot is only empty if its task panicked
        slots
            .into_iter()
            .zip(&packages)
            .map(|(slot, package)| {
                slot.unwrap_or_else(|| {
                    InstallResult::failed(
                        package,
                        &Error::internal("install task panicked"),
                        Duration::ZERO,
                    )
                })
            })
            .collect()
    }
}
