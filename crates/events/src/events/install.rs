use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;

/// Stages of a single package install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPhase {
    AcquiringLock,
    Fetching,
    Verifying,
    Extracting,
    Publishing,
}

impl InstallPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcquiringLock => "acquiring_lock",
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallEvent {
    Started {
        package: String,
        destination: PathBuf,
    },

    PhaseChanged {
        package: String,
        phase: InstallPhase,
    },

    Completed {
        package: String,
        destination: PathBuf,
        files: usize,
        duration: Duration,
    },

    Failed {
        package: String,
        phase: Option<InstallPhase>,
        failure: FailureContext,
    },

    Cancelled {
        package: String,
        phase: Option<InstallPhase>,
    },

    Removed {
        package: String,
        destination: PathBuf,
    },
}
