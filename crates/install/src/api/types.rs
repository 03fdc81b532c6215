//! Inputs and outputs of a single package install

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use yama_errors::{Error, FailureKind, InstallError, UserFacingError};
use yama_hash::Hash;

/// A resolved package: where to get it, what it must hash to, where it goes
///
/// Immutable once built; the coordinator only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    pub resolved_url: String,
    pub expected_digest: Hash,
    pub destination_path: PathBuf,
}

impl PackageRef {
    /// Build and validate a package reference
    ///
    /// # Errors
    ///
    /// Returns `InvalidPackageRef` if the name, URL or destination is unusable.
    pub fn new(
        name: impl Into<String>,
        resolved_url: impl Into<String>,
        expected_digest: Hash,
        destination_path: impl Into<PathBuf>,
    ) -> Result<Self, Error> {
        let package = Self {
            name: name.into(),
            resolved_url: resolved_url.into(),
            expected_digest,
            destination_path: destination_path.into(),
        };
        package.validate()?;
        Ok(package)
    }

    /// Check the fields the pipeline relies on
    ///
    /// The name ends up in directory names, so it is restricted to a
    /// filename-safe alphabet.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPackageRef` describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| -> Error { InstallError::InvalidPackageRef { message }.into() };

        if self.name.is_empty() || self.name.len() > 128 {
            return Err(invalid(format!("invalid package name length: {:?}", self.name)));
        }
        if self.name.starts_with('.')
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
        {
            return Err(invalid(format!("invalid package name: {:?}", self.name)));
        }
        if self.resolved_url.trim().is_empty() {
            return Err(invalid(format!("package {} has no URL", self.name)));
        }
        if self.destination_path.as_os_str().is_empty()
            || self.destination_path.file_name().is_none()
        {
            return Err(invalid(format!(
                "package {} has unusable destination {}",
                self.name,
                self.destination_path.display()
            )));
        }
        Ok(())
    }
}

/// Why an install failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self {
            kind: error.failure_kind(),
            message: error.user_message().into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InstallStatus {
    Success,
    Failed(FailureReason),
    Cancelled,
}

/// Terminal outcome of one install attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallResult {
    pub name: String,
    pub status: InstallStatus,
    pub destination_path: PathBuf,
    pub duration_ms: u64,
    /// Regular files published; zero unless the install succeeded
    pub files: usize,
}

impl InstallResult {
    #[must_use]
    pub fn success(package: &PackageRef, elapsed: Duration, files: usize) -> Self {
        Self::with_status(package, InstallStatus::Success, elapsed, files)
    }

    #[must_use]
    pub fn failed(package: &PackageRef, error: &Error, elapsed: Duration) -> Self {
        Self::with_status(
            package,
            InstallStatus::Failed(FailureReason::from_error(error)),
            elapsed,
            0,
        )
    }

    #[must_use]
    pub fn cancelled(package: &PackageRef, elapsed: Duration) -> Self {
        Self::with_status(package, InstallStatus::Cancelled, elapsed, 0)
    }

    fn with_status(
        package: &PackageRef,
        status: InstallStatus,
        elapsed: Duration,
        files: usize,
    ) -> Self {
        Self {
            name: package.name.clone(),
            status,
            destination_path: package.destination_path.clone(),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            files,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, InstallStatus::Success)
    }

    /// Failure classification, if the install did not succeed
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            InstallStatus::Success => None,
            InstallStatus::Failed(reason) => Some(reason.kind),
            InstallStatus::Cancelled => Some(FailureKind::Cancelled),
        }
    }

    /// Process exit code for this result; 0 only on success
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failure_kind().map_or(0, FailureKind::exit_code)
    }
}
