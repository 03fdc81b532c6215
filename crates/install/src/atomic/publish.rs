use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use yama_errors::{Error, InstallError};

/// What happened to the destination during publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// A previous tree was replaced
    pub replaced: bool,
    /// The previous tree could not be deleted and still sits here
    pub leftover: Option<PathBuf>,
}

/// Publish `tree` at `destination`
///
/// `tree` is consumed: it is renamed away, or copied and then removed when
/// it lives on a different filesystem than the destination.
///
/// # Errors
///
/// Returns `PublishFailed` if the new tree could not be moved into place
/// (the previous contents are restored), `RollbackFailed` if restoring also
/// failed, or an I/O error from staging the tree beside the destination.
pub async fn publish(tree: &Path, destination: &Path) -> Result<PublishOutcome, Error> {
    let parent = parent_of(destination)?;
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| Error::io_with_path(&e, &parent))?;

    let incoming = sibling(destination, "incoming")?;
    stage_beside(tree, &incoming).await?;

    match swap_in(&incoming, destination).await {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            discard(&incoming).await;
            Err(error)
        }
    }
}

/// Remove an installed tree, moving it aside first so the destination
/// disappears in one step
///
/// Returns `false` if there was nothing to remove.
///
/// # Errors
///
/// Returns an I/O error if the tree cannot be moved aside or deleted.
pub async fn remove_tree(destination: &Path) -> Result<bool, Error> {
    match tokio::fs::symlink_metadata(destination).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io_with_path(&e, destination)),
    }

    let disposal = sibling(destination, "old")?;
    tokio::fs::rename(destination, &disposal)
        .await
        .map_err(|e| Error::io_with_path(&e, destination))?;
    remove_any(&disposal)
        .await
        .map_err(|e| Error::io_with_path(&e, &disposal))?;
    Ok(true)
}

/// Move aside, rename in, delete the old tree; restore on failure
pub(crate) async fn swap_in(incoming: &Path, destination: &Path) -> Result<PublishOutcome, Error> {
    let disposal = sibling(destination, "old")?;

    let replaced = match tokio::fs::symlink_metadata(destination).await {
        Ok(_) => {
            tokio::fs::rename(destination, &disposal)
                .await
                .map_err(|e| publish_failed(destination, &e.to_string()))?;
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(Error::io_with_path(&e, destination)),
    };

    if let Err(e) = tokio::fs::rename(incoming, destination).await {
        if replaced {
            if let Err(restore) = tokio::fs::rename(&disposal, destination).await {
                return Err(InstallError::RollbackFailed {
                    destination: destination.display().to_string(),
                    message: format!(
                        "{e}; previous contents left at {}: {restore}",
                        disposal.display()
                    ),
                }
                .into());
            }
        }
        return Err(publish_failed(destination, &e.to_string()));
    }

    let leftover = if replaced && remove_any(&disposal).await.is_err() {
        Some(disposal)
    } else {
        None
    };
    Ok(PublishOutcome { replaced, leftover })
}

/// Get `tree` to `incoming`, which sits on the destination's filesystem
async fn stage_beside(tree: &Path, incoming: &Path) -> Result<(), Error> {
    match tokio::fs::rename(tree, incoming).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            let (from, to) = (tree.to_path_buf(), incoming.to_path_buf());
            let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
                .await
                .map_err(|e| Error::internal(format!("copy task failed: {e}")))?;
            if let Err(error) = copied {
                discard(incoming).await;
                return Err(error);
            }
            discard(tree).await;
            Ok(())
        }
        Err(e) => Err(Error::io_with_path(&e, tree)),
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), Error> {
    std::fs::create_dir(to).map_err(|e| Error::io_with_path(&e, to))?;
    let entries = std::fs::read_dir(from).map_err(|e| Error::io_with_path(&e, from))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_with_path(&e, from))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        let kind = entry
            .file_type()
            .map_err(|e| Error::io_with_path(&e, &source))?;

        if kind.is_dir() {
            copy_tree(&source, &target)?;
        } else if kind.is_symlink() {
            copy_symlink(&source, &target)?;
        } else {
            std::fs::copy(&source, &target).map_err(|e| Error::io_with_path(&e, &target))?;
        }
    }
    let permissions = std::fs::metadata(from)
        .map_err(|e| Error::io_with_path(&e, from))?
        .permissions();
    std::fs::set_permissions(to, permissions).map_err(|e| Error::io_with_path(&e, to))
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), Error> {
    let link = std::fs::read_link(source).map_err(|e| Error::io_with_path(&e, source))?;
    std::os::unix::fs::symlink(link, target).map_err(|e| Error::io_with_path(&e, target))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, target: &Path) -> Result<(), Error> {
    std::fs::copy(source, target)
        .map(|_| ())
        .map_err(|e| Error::io_with_path(&e, target))
}

fn parent_of(destination: &Path) -> Result<PathBuf, Error> {
    destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| publish_failed(destination, "destination has no parent directory"))
}

/// Hidden sibling next to `destination`, e.g. `.libfoo.yama-old-<uuid>`
fn sibling(destination: &Path, tag: &str) -> Result<PathBuf, Error> {
    let parent = parent_of(destination)?;
    let name = destination
        .file_name()
        .ok_or_else(|| publish_failed(destination, "destination has no file name"))?
        .to_string_lossy();
    Ok(parent.join(format!(".{name}.yama-{tag}-{}", Uuid::new_v4())))
}

fn publish_failed(destination: &Path, message: &str) -> Error {
    InstallError::PublishFailed {
        destination: destination.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

async fn remove_any(path: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

async fn discard(path: &Path) {
    let _ = remove_any(path).await;
}
