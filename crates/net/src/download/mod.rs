//! Resumable streaming downloads of package archives
//!
//! A download streams into `<target>.part`, hashing as it goes, and is
//! renamed onto `target` only once the whole body has arrived. A failed
//! fetch removes the partial file.

mod config;
mod core;
mod resume;
mod retry;
mod stream;
mod validation;

pub use config::{FetchOptions, PackageDownloadConfig, RetryConfig, StagedArchive};
pub use core::PackageDownloader;
