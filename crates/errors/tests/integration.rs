//! Integration tests for error types

#[cfg(test)]
mod tests {
    use yama_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = InstallError::PathTraversal {
            entry: "../../etc/passwd".into(),
        };
        assert_eq!(
            err.to_string(),
            "archive entry escapes the work directory: ../../etc/passwd"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = InstallError::AlreadyInstalling {
            destination: "/opt/libfoo".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err = StorageError::from_io_with_path(&io_err, std::path::Path::new("/opt"));
        assert!(matches!(storage_err, StorageError::PermissionDenied { .. }));
    }

    #[test]
    fn test_failure_kind_exit_code_roundtrip() {
        let err: Error = InstallError::CorruptArchive {
            path: "pkg.tar".into(),
            message: "truncated header".into(),
        }
        .into();
        let kind = err.failure_kind();
        assert_eq!(kind, FailureKind::CorruptArchive);
        assert_eq!(kind.exit_code(), 21);
        assert_eq!(kind.to_string(), "corrupt_archive");
    }
}
