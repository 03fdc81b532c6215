//! Runtime configuration for the install pipeline

use std::path::PathBuf;
use std::time::Duration;
use yama_net::PackageDownloadConfig;
use yama_types::LockMode;

/// Install pipeline configuration
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Per-attempt staging directories are created below this root
    pub staging_root: PathBuf,
    /// Root for work directories; `None` uses the destination's parent so
    /// the final publish is a same-filesystem rename
    pub work_root: Option<PathBuf>,
    pub lock_mode: LockMode,
    pub extract_timeout: Duration,
    pub pool_size: usize,
    /// Installed-package registry file, if installs should be recorded
    pub registry_path: Option<PathBuf>,
    pub download: PackageDownloadConfig,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            staging_root: std::env::temp_dir().join("yama-staging"),
            work_root: None,
            lock_mode: LockMode::Wait,
            extract_timeout: Duration::from_secs(600),
            pool_size: 4,
            registry_path: None,
            download: PackageDownloadConfig::default(),
        }
    }
}

impl InstallConfig {
    /// Build from the loaded configuration file
    #[must_use]
    pub fn from_config(config: &yama_config::Config) -> Self {
        Self {
            staging_root: config.staging_path(),
            work_root: config.paths.work_dir.clone(),
            lock_mode: config.install.lock_mode,
            extract_timeout: Duration::from_secs(config.install.extract_timeout),
            pool_size: yama_config::calculate_pool_size(config.install.pool_size),
            registry_path: config
                .install
                .record_installs
                .then(|| config.registry_path()),
            download: PackageDownloadConfig::from_config(&config.network),
        }
    }

    #[must_use]
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    #[must_use]
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    #[must_use]
    pub fn with_registry(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }
}
