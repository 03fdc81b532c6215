//! Fixed file and directory names used by yama

pub const APP_DIR: &str = "yama";
pub const CONFIG_FILE: &str = "config.toml";

/// Installed-package registry, kept under the state directory
pub const REGISTRY_FILE: &str = "installed_packages.json";
pub const LOGS_DIR: &str = "logs";

pub const STAGING_DIR: &str = "staging";

/// Suffix of in-progress downloads next to their target
pub const PARTIAL_SUFFIX: &str = "part";
