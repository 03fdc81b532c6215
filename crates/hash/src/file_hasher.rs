//! Directory tree hashing
//!
//! Walks an installed or freshly extracted tree and hashes every entry so
//! two trees can be compared by a single digest, such as a published
//! destination against a direct extraction of the same archive.

use crate::{Hash, HashAlgorithm, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use yama_errors::{Error, StorageError};

/// Result of hashing a single tree entry
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileHashResult {
    /// Path relative to the tree root, always `/`-separated
    pub relative_path: String,
    /// Content hash; symlinks hash their target string, directories hash nothing
    pub hash: Hash,
    pub size: u64,
    pub is_directory: bool,
    pub is_symlink: bool,
    /// Permission bits of regular files
    pub mode: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct FileHasherConfig {
    pub algorithm: HashAlgorithm,
    /// Maximum number of files hashed at once
    pub max_concurrency: usize,
    pub include_directories: bool,
}

impl Default for FileHasherConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            max_concurrency: 4,
            include_directories: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileHasher {
    config: FileHasherConfig,
}

impl FileHasher {
    #[must_use]
    pub fn new(config: FileHasherConfig) -> Self {
        Self { config }
    }

    /// Hash one entry below `base_path`
    ///
    /// # Errors
    /// Returns an error if the entry cannot be read or lies outside `base_path`.
    pub async fn hash_entry(&self, path: &Path, base_path: &Path) -> Result<FileHashResult, Error> {
        let algorithm = self.config.algorithm;
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;

        let relative_path = path
            .strip_prefix(base_path)
            .map_err(|_| StorageError::InvalidPath {
                path: path.display().to_string(),
            })?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if metadata.is_dir() {
            return Ok(FileHashResult {
                relative_path,
                hash: Hash::from_data(algorithm, b""),
                size: 0,
                is_directory: true,
                is_symlink: false,
                mode: None,
            });
        }

        if metadata.is_symlink() {
            let target = tokio::fs::read_link(path).await?;
            let target = target.to_string_lossy();
            return Ok(FileHashResult {
                relative_path,
                hash: Hash::from_data(algorithm, target.as_bytes()),
                size: target.len() as u64,
                is_directory: false,
                is_symlink: true,
                mode: None,
            });
        }

        Ok(FileHashResult {
            relative_path,
            hash: Hash::hash_file(algorithm, path).await?,
            size: metadata.len(),
            is_directory: false,
            is_symlink: false,
            mode: file_mode(&metadata),
        })
    }

    /// Hash all entries below `dir_path`, sorted by relative path
    ///
    /// # Errors
    /// Returns an error if traversal or any file read fails.
    pub async fn hash_directory(&self, dir_path: &Path) -> Result<Vec<FileHashResult>, Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let base_path = dir_path.to_path_buf();

        let collector = tokio::spawn({
            let base_path = base_path.clone();
            let include_dirs = self.config.include_directories;
            async move { collect_entries(&base_path, tx, include_dirs).await }
        });

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        while let Some(entry_path) = rx.recv().await {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(format!("semaphore closed: {e}")))?;
            let base_path = base_path.clone();
            let hasher = self.clone();

            tasks.spawn(async move {
                let _permit = permit;
                hasher.hash_entry(&entry_path, &base_path).await
            });
        }

        collector
            .await
            .map_err(|e| Error::internal(format!("task join error: {e}")))??;

        let mut results = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(entry) => results.push(entry?),
                Err(e) => return Err(Error::internal(format!("task join error: {e}"))),
            }
        }

        results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(results)
    }
}

/// Single digest over a whole directory tree
///
/// Covers every entry's relative path, kind, content and file mode, so two
/// trees have equal digests exactly when they hold the same content.
///
/// # Errors
/// Returns an error if the tree cannot be walked or read.
pub async fn tree_digest(algorithm: HashAlgorithm, dir: &Path) -> Result<Hash, Error> {
    let hasher = FileHasher::new(FileHasherConfig {
        algorithm,
        ..FileHasherConfig::default()
    });
    let entries = hasher.hash_directory(dir).await?;

    let mut tree = Hasher::new(algorithm);
    for entry in &entries {
        let kind = if entry.is_directory {
            "d"
        } else if entry.is_symlink {
            "l"
        } else {
            "f"
        };
        tree.update(kind.as_bytes());
        tree.update(entry.relative_path.as_bytes());
        tree.update(&[0]);
        tree.update(entry.hash.as_bytes());
        tree.update(&entry.mode.unwrap_or(0).to_le_bytes());
    }
    Ok(tree.finalize())
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}

async fn collect_entries(
    current_path: &Path,
    tx: mpsc::UnboundedSender<PathBuf>,
    include_directories: bool,
) -> Result<(), Error> {
    let mut entries = tokio::fs::read_dir(current_path)
        .await
        .map_err(|e| Error::io_with_path(&e, current_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // file_type does not follow symlinks
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            if include_directories {
                let _ = tx.send(path.clone());
            }
            Box::pin(collect_entries(&path, tx.clone(), include_directories)).await?;
        } else {
            let _ = tx.send(path);
        }
    }

    Ok(())
}
