//! Record of completed installs
//!
//! A JSON file listing what was installed where. Writes go to a temporary
//! sibling and are renamed over the file, so a crash never leaves a torn
//! registry behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;
use yama_errors::{Error, StorageError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub url: String,
    /// Archive digest as `algorithm:hex`
    pub digest: String,
    pub destination: PathBuf,
    pub files: usize,
    pub installed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    packages: Vec<InstalledPackage>,
}

#[derive(Debug)]
pub struct InstalledRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl InstalledRegistry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded packages, sorted by name
    ///
    /// # Errors
    ///
    /// Returns an error if the registry exists but cannot be read or parsed.
    pub async fn list(&self) -> Result<Vec<InstalledPackage>, Error> {
        let mut packages = self.load().await?.packages;
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(packages)
    }

    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub async fn get(&self, name: &str) -> Result<Option<InstalledPackage>, Error> {
        Ok(self
            .load()
            .await?
            .packages
            .into_iter()
            .find(|p| p.name == name))
    }

    /// Record an install, replacing any earlier record with the same name
    /// or destination
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or written.
    pub async fn record(&self, package: InstalledPackage) -> Result<(), Error> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        file.packages
            .retain(|p| p.name != package.name && p.destination != package.destination);
        file.packages.push(package);
        self.store(&file).await
    }

    /// Drop the record for `name`, returning it if present
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read or written.
    pub async fn remove(&self, name: &str) -> Result<Option<InstalledPackage>, Error> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        let Some(index) = file.packages.iter().position(|p| p.name == name) else {
            return Ok(None);
        };
        let removed = file.packages.remove(index);
        self.store(&file).await?;
        Ok(Some(removed))
    }

    async fn load(&self) -> Result<RegistryFile, Error> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RegistryFile::default())
            }
            Err(e) => return Err(Error::io_with_path(&e, &self.path)),
        };
        serde_json::from_str(&raw).map_err(|e| {
            StorageError::CorruptedData {
                message: format!("{}: {e}", self.path.display()),
            }
            .into()
        })
    }

    async fn store(&self, file: &RegistryFile) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let json = serde_json::to_vec_pretty(file)?;
        let temp = self
            .path
            .with_extension(format!("json.tmp-{}", Uuid::new_v4()));
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| Error::io_with_path(&e, &temp))?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::io_with_path(&e, &self.path));
        }
        Ok(())
    }
}
