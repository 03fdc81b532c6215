#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Package installation for yama
//!
//! Turns a resolved package reference into an installed directory tree:
//! the archive is fetched into a private staging directory, verified
//! against its expected digest, extracted into a private work directory
//! with every entry checked for containment, and finally published at the
//! destination with an atomic rename. Installs into the same destination
//! are serialised; independent packages run in parallel on a bounded pool.

pub mod api;
pub mod atomic;
pub mod coordinator;
pub mod extract;
pub mod lock;
pub mod parallel;
pub mod registry;
pub mod staging;
pub mod validation;

pub use api::config::InstallConfig;
pub use api::types::{FailureReason, InstallResult, InstallStatus, PackageRef};
pub use coordinator::InstallCoordinator;
pub use extract::{ArchiveExtractor, ExtractedTree, TreeStats};
pub use lock::{InstallLock, LockRegistry};
pub use parallel::InstallPool;
pub use registry::{InstalledPackage, InstalledRegistry};
pub use staging::ScopedDir;
pub use validation::ArchiveFormat;
