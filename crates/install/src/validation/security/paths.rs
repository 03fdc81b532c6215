//! Archive entry path validation

use std::path::{Component, Path, PathBuf};
use yama_errors::{Error, InstallError};

const MAX_COMPONENT_LEN: usize = 255;

/// Validate an archive entry name and return it as a clean relative path
///
/// Absolute names, `..` components and NUL bytes are rejected outright.
/// `.` components are dropped, so `./bin/tool` becomes `bin/tool`. An entry
/// that names the archive root itself yields an empty path.
///
/// # Errors
///
/// Returns `PathTraversal` naming the offending entry.
pub fn validate_entry_path(raw: &Path) -> Result<PathBuf, Error> {
    let traversal = || -> Error {
        InstallError::PathTraversal {
            entry: raw.display().to_string(),
        }
        .into()
    };

    if raw.as_os_str().to_string_lossy().contains('\0') {
        return Err(traversal());
    }

    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => {
                if part.len() > MAX_COMPONENT_LEN {
                    return Err(InstallError::CorruptArchive {
                        path: raw.display().to_string(),
                        message: "path component too long".to_string(),
                    }
                    .into());
                }
                clean.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    Ok(clean)
}

/// Lexically normalise a path, resolving `.` and `..` without touching disk
///
/// Relative paths are anchored at the current directory first.
///
/// # Errors
///
/// Returns an error if the current directory cannot be read.
pub fn normalize_path(path: &Path) -> Result<PathBuf, Error> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io_with_path(&e, path))?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}
