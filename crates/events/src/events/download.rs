use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::FailureContext;

/// Events emitted by the content fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Response headers received, body transfer starting
    Started {
        url: String,
        package: Option<String>,
        total_size: Option<u64>,
        supports_resume: bool,
    },

    /// Range request issued for a partial staging file
    Resuming {
        url: String,
        resume_offset: u64,
        attempt: u32,
    },

    Retrying {
        url: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
        backoff_delay: Duration,
    },

    Completed {
        url: String,
        package: Option<String>,
        final_size: u64,
        total_time: Duration,
        digest: String,
    },

    Failed {
        url: String,
        package: Option<String>,
        failure: FailureContext,
    },
}
