//! Single-package install pipeline
//!
//! lock → fetch → verify → extract → publish → record. Every attempt gets
//! its own staging and work directories, both removed on every exit path,
//! and the destination is only ever touched by the final atomic publish.

use crate::api::config::InstallConfig;
use crate::api::types::{InstallResult, PackageRef};
use crate::atomic::publish;
use crate::extract::{ArchiveExtractor, ExtractedTree};
use crate::lock::LockRegistry;
use crate::registry::{InstalledPackage, InstalledRegistry};
use crate::staging::ScopedDir;
use crate::validation::normalize_path;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;
use yama_errors::{Error, InstallError};
use yama_events::{
    AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent, InstallPhase,
};
use yama_hash::IntegrityVerifier;
use yama_net::{FetchOptions, PackageDownloader};
use yama_types::CancellationToken;

pub struct InstallCoordinator {
    config: InstallConfig,
    downloader: PackageDownloader,
    verifier: IntegrityVerifier,
    extractor: ArchiveExtractor,
    locks: LockRegistry,
    registry: Option<InstalledRegistry>,
    tx: Option<EventSender>,
}

impl std::fmt::Debug for InstallCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallCoordinator")
            .field("config", &self.config)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl EventEmitter for InstallCoordinator {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Tracks the phase an attempt is in, for failure reporting
struct Attempt<'a> {
    package: &'a PackageRef,
    phase: Option<InstallPhase>,
}

impl InstallCoordinator {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: InstallConfig) -> Result<Self, Error> {
        let downloader = PackageDownloader::new(config.download.clone())?;
        let extractor = ArchiveExtractor::new(config.extract_timeout);
        let registry = config.registry_path.clone().map(InstalledRegistry::new);
        Ok(Self {
            config,
            downloader,
            verifier: IntegrityVerifier::new(),
            extractor,
            locks: LockRegistry::new(),
            registry,
            tx: None,
        })
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    #[must_use]
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    #[must_use]
    pub fn registry(&self) -> Option<&InstalledRegistry> {
        self.registry.as_ref()
    }

    /// Install one package without external cancellation
    pub async fn install(&self, package: &PackageRef) -> InstallResult {
        self.install_with_cancel(package, &CancellationToken::new())
            .await
    }

    /// Install one package
    ///
    /// Never panics on pipeline failures: every outcome, including
    /// cancellation, is reported through the returned result.
    pub async fn install_with_cancel(
        &self,
        package: &PackageRef,
        cancel: &CancellationToken,
    ) -> InstallResult {
        let start = Instant::now();
        self.emit_install_started(&package.name, package.destination_path.clone());

        let mut attempt = Attempt {
            package,
            phase: None,
        };
        let outcome = self.run(&mut attempt, cancel).await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(tree) => {
                self.emit_install_completed(
                    &package.name,
                    tree.root.clone(),
                    tree.stats.files,
                    elapsed,
                );
                InstallResult::success(package, elapsed, tree.stats.files)
            }
            Err(error) if error.is_cancelled() => {
                self.emit(AppEvent::Install(InstallEvent::Cancelled {
                    package: package.name.clone(),
                    phase: attempt.phase,
                }));
                InstallResult::cancelled(package, elapsed)
            }
            Err(error) => {
                self.emit(AppEvent::Install(InstallEvent::Failed {
                    package: package.name.clone(),
                    phase: attempt.phase,
                    failure: FailureContext::from_error(&error),
                }));
                InstallResult::failed(package, &error, elapsed)
            }
        }
    }

    /// Remove an installed package and its registry record
    ///
    /// # Errors
    ///
    /// Returns `PackageNotInstalled` if the registry has no record of
    /// `name`, or an error from locking or deleting the destination.
    pub async fn remove(&self, name: &str) -> Result<InstalledPackage, Error> {
        let not_installed = || -> Error {
            InstallError::PackageNotInstalled {
                package: name.to_string(),
            }
            .into()
        };
        let registry = self.registry.as_ref().ok_or_else(not_installed)?;
        let record = registry.get(name).await?.ok_or_else(not_installed)?;

        let _lock = self
            .locks
            .acquire(
                &record.destination,
                self.config.lock_mode,
                &CancellationToken::new(),
            )
            .await?;
        if !crate::atomic::remove_tree(&record.destination).await? {
            self.emit_warning(format!(
                "{} was already missing from {}",
                name,
                record.destination.display()
            ));
        }
        registry.remove(name).await?;

        self.emit(AppEvent::Install(InstallEvent::Removed {
            package: record.name.clone(),
            destination: record.destination.clone(),
        }));
        Ok(record)
    }

    fn enter(&self, attempt: &mut Attempt<'_>, phase: InstallPhase) {
        attempt.phase = Some(phase);
        self.emit_install_phase(&attempt.package.name, phase);
    }

    async fn run(
        &self,
        attempt: &mut Attempt<'_>,
        cancel: &CancellationToken,
    ) -> Result<ExtractedTree, Error> {
        let package = attempt.package;
        package.validate()?;
        let destination = normalize_path(&package.destination_path)?;

        self.enter(attempt, InstallPhase::AcquiringLock);
        let lock = self
            .locks
            .acquire(&destination, self.config.lock_mode, cancel)
            .await?;

        let attempt_id = Uuid::new_v4();
        let staging = ScopedDir::create(
            self.config
                .staging_root
                .join(format!("{}-{attempt_id}", package.name)),
        )
        .await?;
        let work_parent = self.work_parent(&destination)?;
        let work = match ScopedDir::create(
            work_parent.join(format!(".yama-work-{}-{attempt_id}", package.name)),
        )
        .await
        {
            Ok(work) => work,
            Err(error) => {
                let _ = staging.cleanup().await;
                return Err(error);
            }
        };

        let result = self
            .pipeline(attempt, &destination, &staging, &work, cancel)
            .await;

        // Both directories go away whatever happened; a cleanup failure
        // after a successful publish is only worth a warning
        for dir in [staging, work] {
            let path = dir.path().to_path_buf();
            if let Err(error) = dir.cleanup().await {
                self.emit_warning_with_context(
                    format!("failed to remove {}", path.display()),
                    error.to_string(),
                );
            }
        }
        drop(lock);
        result
    }

    async fn pipeline(
        &self,
        attempt: &mut Attempt<'_>,
        destination: &Path,
        staging: &ScopedDir,
        work: &ScopedDir,
        cancel: &CancellationToken,
    ) -> Result<ExtractedTree, Error> {
        let package = attempt.package;

        self.enter(attempt, InstallPhase::Fetching);
        let options = FetchOptions {
            algorithm: package.expected_digest.algorithm(),
            package: Some(package.name.clone()),
            cancel: cancel.clone(),
            events: self.tx.clone(),
        };
        let target = staging.path().join(format!("{}.archive", package.name));
        let staged = self
            .downloader
            .fetch(&package.resolved_url, &target, &options)
            .await?;

        self.enter(attempt, InstallPhase::Verifying);
        self.verifier
            .verify(&staged.local_path, &package.expected_digest, cancel)
            .await?;

        self.enter(attempt, InstallPhase::Extracting);
        let mut tree = self
            .extractor
            .extract(&staged.local_path, work.path(), cancel)
            .await?;

        // Last point at which cancellation is honoured; publish runs to completion
        ensure_not_cancelled(cancel)?;
        self.enter(attempt, InstallPhase::Publishing);
        let outcome = publish(work.path(), destination).await?;
        if let Some(leftover) = outcome.leftover {
            self.emit_warning(format!(
                "previous contents of {} left at {}",
                destination.display(),
                leftover.display()
            ));
        }
        tree.root = destination.to_path_buf();

        if let Some(registry) = &self.registry {
            let record = InstalledPackage {
                name: package.name.clone(),
                url: package.resolved_url.clone(),
                digest: package.expected_digest.to_string(),
                destination: destination.to_path_buf(),
                files: tree.stats.files,
                installed_at: chrono::Utc::now(),
            };
            if let Err(error) = registry.record(record).await {
                self.emit_warning_with_context(
                    format!("installed {} but could not record it", package.name),
                    error.to_string(),
                );
            }
        }

        Ok(tree)
    }

    fn work_parent(&self, destination: &Path) -> Result<PathBuf, Error> {
        if let Some(root) = &self.config.work_root {
            return Ok(root.clone());
        }
        destination.parent().map(Path::to_path_buf).ok_or_else(|| {
            InstallError::InvalidPackageRef {
                message: format!("destination {} has no parent", destination.display()),
            }
            .into()
        })
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), Error> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
