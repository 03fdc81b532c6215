//! Coarse failure classification reported to callers of the install pipeline
//!
//! Every error in the workspace collapses into exactly one `FailureKind`,
//! which is what the CLI turns into a process exit code.

use std::fmt;

use crate::{Error, InstallError, NetworkError, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum FailureKind {
    Network,
    HttpStatus,
    Timeout,
    DigestMismatch,
    CorruptArchive,
    PathTraversal,
    DiskFull,
    AlreadyInstalling,
    Cancelled,
    Config,
    Io,
    Internal,
}

impl FailureKind {
    /// Process exit code for this failure; 0 is reserved for success
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Network => 10,
            Self::HttpStatus => 11,
            Self::Timeout => 12,
            Self::DigestMismatch => 20,
            Self::CorruptArchive => 21,
            Self::PathTraversal => 22,
            Self::DiskFull => 23,
            Self::AlreadyInstalling => 30,
            Self::Config => 78,
            Self::Io => 74,
            Self::Internal => 70,
            Self::Cancelled => 130,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::Timeout => "timeout",
            Self::DigestMismatch => "digest_mismatch",
            Self::CorruptArchive => "corrupt_archive",
            Self::PathTraversal => "path_traversal",
            Self::DiskFull => "disk_full",
            Self::AlreadyInstalling => "already_installing",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error for result reporting
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Network(err) => match err {
                NetworkError::Timeout { .. } => FailureKind::Timeout,
                NetworkError::HttpError { .. } | NetworkError::RateLimited { .. } => {
                    FailureKind::HttpStatus
                }
                _ => FailureKind::Network,
            },
            Error::Storage(StorageError::DiskFull { .. }) => FailureKind::DiskFull,
            Error::Storage(StorageError::CorruptedData { .. }) => FailureKind::CorruptArchive,
            Error::Storage(_) | Error::Io { .. } => FailureKind::Io,
            Error::Install(err) => match err {
                InstallError::DigestMismatch { .. } => FailureKind::DigestMismatch,
                InstallError::CorruptArchive { .. } => FailureKind::CorruptArchive,
                InstallError::PathTraversal { .. } | InstallError::UnsafeSymlink { .. } => {
                    FailureKind::PathTraversal
                }
                InstallError::ExtractionTimeout { .. } => FailureKind::Timeout,
                InstallError::AlreadyInstalling { .. } => FailureKind::AlreadyInstalling,
                InstallError::InvalidPackageRef { .. } => FailureKind::Config,
                InstallError::ConcurrencyError { .. } => FailureKind::Internal,
                _ => FailureKind::Io,
            },
            Error::Config(_) => FailureKind::Config,
            Error::Cancelled => FailureKind::Cancelled,
            Error::Internal(_) => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [FailureKind; 12] = [
        FailureKind::Network,
        FailureKind::HttpStatus,
        FailureKind::Timeout,
        FailureKind::DigestMismatch,
        FailureKind::CorruptArchive,
        FailureKind::PathTraversal,
        FailureKind::DiskFull,
        FailureKind::AlreadyInstalling,
        FailureKind::Cancelled,
        FailureKind::Config,
        FailureKind::Io,
        FailureKind::Internal,
    ];

    #[test]
    fn exit_codes_are_distinct_and_non_zero() {
        let codes: HashSet<i32> = ALL.iter().map(|k| k.exit_code()).collect();
        assert_eq!(codes.len(), ALL.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn classifies_pipeline_errors() {
        let timeout: Error = NetworkError::Timeout {
            url: "https://example.com".into(),
        }
        .into();
        assert_eq!(timeout.failure_kind(), FailureKind::Timeout);

        let status: Error = NetworkError::HttpError {
            status: 404,
            message: "Not Found".into(),
        }
        .into();
        assert_eq!(status.failure_kind(), FailureKind::HttpStatus);

        let symlink: Error = InstallError::UnsafeSymlink {
            entry: "lib/evil".into(),
            target: "/etc/passwd".into(),
        }
        .into();
        assert_eq!(symlink.failure_kind(), FailureKind::PathTraversal);

        assert_eq!(Error::Cancelled.failure_kind(), FailureKind::Cancelled);
    }

    #[test]
    fn storage_full_io_error_is_disk_full() {
        let err = std::io::Error::from_raw_os_error(28);
        let err: Error = err.into();
        assert_eq!(err.failure_kind(), FailureKind::DiskFull);
    }
}
