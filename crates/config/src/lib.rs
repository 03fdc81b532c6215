#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for yama
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/yama/config.toml)
//! - Environment variables (`YAMA_*`)
//! - CLI flags, applied by the binary after `merge_env`

pub mod constants;
pub mod resources_semaphore;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use yama_errors::{ConfigError, Error};
use yama_hash::HashAlgorithm;
use yama_types::{ColorChoice, LockMode, OutputFormat};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_output: OutputFormat,
    #[serde(default)]
    pub color: ColorChoice,
}

/// Path configuration; unset entries fall back to platform directories
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Root for per-install download staging directories
    pub staging_dir: Option<PathBuf>,
    /// Root for extraction work directories; defaults to the destination's parent
    pub work_dir: Option<PathBuf>,
    /// Holds the installed-package registry and debug logs
    pub state_dir: Option<PathBuf>,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overall fetch timeout including retries, seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    /// Per-attempt timeout, seconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: u64,
    /// Longest allowed stall between body chunks, seconds
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
    /// Partial downloads smaller than this are restarted instead of resumed
    #[serde(default = "default_min_resume_bytes")]
    pub min_resume_bytes: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Concurrent installs; 0 picks a value from the CPU count
    #[serde(default)]
    pub pool_size: usize,
    #[serde(default)]
    pub lock_mode: LockMode,
    /// Extraction timeout, seconds
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout: u64,
    #[serde(default)]
    pub digest_algorithm: HashAlgorithm,
    /// Record successful installs in the installed-package registry
    #[serde(default = "default_record_installs")]
    pub record_installs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            attempt_timeout: default_attempt_timeout(),
            chunk_timeout: default_chunk_timeout(),
            retries: default_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
            min_resume_bytes: default_min_resume_bytes(),
            max_file_size: default_max_file_size(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            pool_size: 0,
            lock_mode: LockMode::Wait,
            extract_timeout: default_extract_timeout(),
            digest_algorithm: HashAlgorithm::Blake3,
            record_installs: default_record_installs(),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout)
    }

    #[must_use]
    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout)
    }
}

// Default value functions for serde

fn default_timeout() -> u64 {
    600 // 10 minutes
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_attempt_timeout() -> u64 {
    300
}

fn default_chunk_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_min_resume_bytes() -> u64 {
    64 * 1024
}

fn default_max_file_size() -> u64 {
    2 * 1024 * 1024 * 1024 // 2GB
}

fn default_user_agent() -> String {
    format!("yama/{}", env!("CARGO_PKG_VERSION"))
}

fn default_extract_timeout() -> u64 {
    600
}

fn default_record_installs() -> bool {
    true
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir
            .join(constants::APP_DIR)
            .join(constants::CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// holds out-of-range values.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Reject values the pipeline cannot work with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |field: &str, value: String| -> Error {
            ConfigError::InvalidValue {
                field: field.to_string(),
                value,
            }
            .into()
        };

        if self.network.backoff_multiplier < 1.0 {
            return Err(invalid(
                "network.backoff_multiplier",
                self.network.backoff_multiplier.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.network.jitter_factor) {
            return Err(invalid(
                "network.jitter_factor",
                self.network.jitter_factor.to_string(),
            ));
        }
        if self.network.timeout == 0 {
            return Err(invalid("network.timeout", "0".to_string()));
        }
        if self.install.extract_timeout == 0 {
            return Err(invalid("install.extract_timeout", "0".to_string()));
        }
        Ok(())
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // YAMA_OUTPUT
        if let Ok(output) = std::env::var("YAMA_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "YAMA_OUTPUT".to_string(),
                        value: output,
                    }
                    .into())
                }
            };
        }

        // YAMA_COLOR
        if let Ok(color) = std::env::var("YAMA_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "YAMA_COLOR".to_string(),
                        value: color,
                    }
                    .into())
                }
            };
        }

        // YAMA_JOBS
        if let Ok(jobs) = std::env::var("YAMA_JOBS") {
            self.install.pool_size = jobs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "YAMA_JOBS".to_string(),
                value: jobs,
            })?;
        }

        // YAMA_LOCK_MODE
        if let Ok(mode) = std::env::var("YAMA_LOCK_MODE") {
            self.install.lock_mode = mode.parse().map_err(|_| ConfigError::InvalidValue {
                field: "YAMA_LOCK_MODE".to_string(),
                value: mode,
            })?;
        }

        // YAMA_RETRIES
        if let Ok(retries) = std::env::var("YAMA_RETRIES") {
            self.network.retries = retries.parse().map_err(|_| ConfigError::InvalidValue {
                field: "YAMA_RETRIES".to_string(),
                value: retries,
            })?;
        }

        // YAMA_DIGEST
        if let Ok(digest) = std::env::var("YAMA_DIGEST") {
            self.install.digest_algorithm =
                digest.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "YAMA_DIGEST".to_string(),
                    value: digest,
                })?;
        }

        // YAMA_STAGING_DIR
        if let Ok(dir) = std::env::var("YAMA_STAGING_DIR") {
            if dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "YAMA_STAGING_DIR".to_string(),
                    value: dir,
                }
                .into());
            }
            self.paths.staging_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Get the staging root (with default)
    #[must_use]
    pub fn staging_path(&self) -> PathBuf {
        self.paths.staging_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(constants::APP_DIR)
                .join(constants::STAGING_DIR)
        })
    }

    /// Get the state path (with default)
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.paths.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(constants::APP_DIR)
        })
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.state_path().join(constants::REGISTRY_FILE)
    }

    #[must_use]
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join(constants::LOGS_DIR)
    }
}

/// Calculate the install pool size based on CPU count
#[must_use]
pub fn calculate_pool_size(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Installs are I/O bound; a few per core is fine but keep it bounded
        num_cpus::get().clamp(2, 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.install.lock_mode, LockMode::Wait);
        assert_eq!(config.network.retries, 3);
        assert!(config.network.fetch_timeout() > config.network.chunk_timeout());
    }

    #[test]
    fn rejects_jitter_out_of_range() {
        let mut config = Config::default();
        config.network.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn pool_size_override_wins() {
        assert_eq!(calculate_pool_size(3), 3);
        let auto = calculate_pool_size(0);
        assert!((2..=8).contains(&auto));
    }

    #[test]
    fn registry_lives_under_state_dir() {
        let mut config = Config::default();
        config.paths.state_dir = Some(PathBuf::from("/var/lib/yama"));
        assert_eq!(
            config.registry_path(),
            PathBuf::from("/var/lib/yama/installed_packages.json")
        );
    }
}
