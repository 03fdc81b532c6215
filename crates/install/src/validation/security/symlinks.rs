//! Symlink target containment

use std::path::{Component, Path, PathBuf};
use yama_errors::{Error, InstallError};

/// Resolve a symlink target relative to the link's location inside the tree
///
/// `link` is the validated relative path of the link itself. The result is
/// the lexically resolved target, relative to the tree root.
///
/// # Errors
///
/// Returns `UnsafeSymlink` if the target is absolute or climbs above the
/// tree root.
pub fn resolve_link_target(link: &Path, target: &Path) -> Result<PathBuf, Error> {
    let unsafe_link = || -> Error {
        InstallError::UnsafeSymlink {
            entry: link.display().to_string(),
            target: target.display().to_string(),
        }
        .into()
    };

    if target.as_os_str().is_empty() || target.is_absolute() {
        return Err(unsafe_link());
    }

    let mut resolved: Vec<_> = link
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();

    for component in target.components() {
        match component {
            Component::Normal(_) => resolved.push(component),
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved.pop().is_none() {
                    return Err(unsafe_link());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_link()),
        }
    }

    Ok(resolved.iter().collect())
}

/// Refuse to write through symlinks that already exist in the tree
///
/// Walks each ancestor of `relative` below `root`; any of them being a
/// symlink means a write could land outside the tree.
///
/// # Errors
///
/// Returns `UnsafeSymlink` for the first symlinked ancestor, or an I/O error
/// if an ancestor cannot be inspected.
pub fn ensure_no_symlink_ancestors(root: &Path, relative: &Path) -> Result<(), Error> {
    let mut current = root.to_path_buf();
    let Some(parent) = relative.parent() else {
        return Ok(());
    };
    for component in parent.components() {
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(InstallError::UnsafeSymlink {
                    entry: relative.display().to_string(),
                    target: current.display().to_string(),
                }
                .into());
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io_with_path(&e, &current)),
        }
    }
    Ok(())
}
