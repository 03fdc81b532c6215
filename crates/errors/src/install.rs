//! Installation pipeline error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("corrupt archive {path}: {message}")]
    CorruptArchive { path: String, message: String },

    #[error("archive entry escapes the work directory: {entry}")]
    PathTraversal { entry: String },

    #[error("symlink {entry} points outside the work directory: {target}")]
    UnsafeSymlink { entry: String, target: String },

    #[error("extraction timed out after {seconds}s")]
    ExtractionTimeout { seconds: u64 },

    #[error("an install into {destination} is already in progress")]
    AlreadyInstalling { destination: String },

    #[error("publishing into {destination} failed: {message}")]
    PublishFailed { destination: String, message: String },

    #[error("rollback of {destination} failed: {message}")]
    RollbackFailed { destination: String, message: String },

    #[error("invalid package reference: {message}")]
    InvalidPackageRef { message: String },

    #[error("package not installed: {package}")]
    PackageNotInstalled { package: String },

    #[error("concurrency error: {message}")]
    ConcurrencyError { message: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DigestMismatch { .. } => {
                Some("The downloaded archive does not match the expected digest; check the source URL.")
            }
            Self::PathTraversal { .. } | Self::UnsafeSymlink { .. } => {
                Some("The archive tried to write outside its install directory and was rejected.")
            }
            Self::AlreadyInstalling { .. } => {
                Some("Wait for the other install to finish or run without --fail-fast.")
            }
            Self::RollbackFailed { .. } => {
                Some("Inspect the destination directory manually; the previous contents were kept beside it.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyInstalling { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DigestMismatch { .. } => "install.digest_mismatch",
            Self::CorruptArchive { .. } => "install.corrupt_archive",
            Self::PathTraversal { .. } => "install.path_traversal",
            Self::UnsafeSymlink { .. } => "install.unsafe_symlink",
            Self::ExtractionTimeout { .. } => "install.extraction_timeout",
            Self::AlreadyInstalling { .. } => "install.already_installing",
            Self::PublishFailed { .. } => "install.publish_failed",
            Self::RollbackFailed { .. } => "install.rollback_failed",
            Self::InvalidPackageRef { .. } => "install.invalid_package_ref",
            Self::PackageNotInstalled { .. } => "install.package_not_installed",
            Self::ConcurrencyError { .. } => "install.concurrency_error",
            Self::FilesystemError { .. } => "install.filesystem_error",
        };
        Some(code)
    }
}
