//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields, so
//! `--debug` log files carry the full install history of a run.

use yama_events::{AppEvent, DownloadEvent, GeneralEvent, InstallEvent};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` at its level, under its domain target
pub fn log_event_with_tracing(event: &AppEvent) {
    match event {
        AppEvent::General(general) => log_general(general),
        AppEvent::Download(download) => log_download(download),
        AppEvent::Install(install) => log_install(install),
    }
}

fn log_general(event: &GeneralEvent) {
    match event {
        GeneralEvent::Warning { message, context } => {
            warn!(
                target: "yama::events::general",
                context = ?context,
                "{message}"
            );
        }
        GeneralEvent::DebugLog { message, context } => {
            debug!(
                target: "yama::events::general",
                context = ?context,
                "{message}"
            );
        }
    }
}

fn log_download(event: &DownloadEvent) {
    match event {
        DownloadEvent::Started {
            url,
            package,
            total_size,
            supports_resume,
        } => {
            info!(
                target: "yama::events::download",
                url = %url,
                package = ?package,
                total_size = ?total_size,
                supports_resume = supports_resume,
                "Download started"
            );
        }
        DownloadEvent::Resuming {
            url,
            resume_offset,
            attempt,
        } => {
            debug!(
                target: "yama::events::download",
                url = %url,
                resume_offset = resume_offset,
                attempt = attempt,
                "Resuming download"
            );
        }
        DownloadEvent::Retrying {
            url,
            attempt,
            max_attempts,
            reason,
            backoff_delay,
        } => {
            warn!(
                target: "yama::events::download",
                url = %url,
                attempt = attempt,
                max_attempts = max_attempts,
                reason = %reason,
                backoff_ms = u64::try_from(backoff_delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying download"
            );
        }
        DownloadEvent::Completed {
            url,
            package,
            final_size,
            total_time,
            digest,
        } => {
            info!(
                target: "yama::events::download",
                url = %url,
                package = ?package,
                final_size = final_size,
                total_time_ms = u64::try_from(total_time.as_millis()).unwrap_or(u64::MAX),
                digest = %digest,
                "Download completed"
            );
        }
        DownloadEvent::Failed {
            url,
            package,
            failure,
        } => {
            error!(
                target: "yama::events::download",
                url = %url,
                package = ?package,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Download failed"
            );
        }
    }
}

fn log_install(event: &InstallEvent) {
    match event {
        InstallEvent::Started {
            package,
            destination,
        } => {
            info!(
                target: "yama::events::install",
                package = %package,
                destination = %destination.display(),
                "Package installation started"
            );
        }
        InstallEvent::PhaseChanged { package, phase } => {
            debug!(
                target: "yama::events::install",
                package = %package,
                phase = %phase,
                "Install phase changed"
            );
        }
        InstallEvent::Completed {
            package,
            destination,
            files,
            duration,
        } => {
            info!(
                target: "yama::events::install",
                package = %package,
                destination = %destination.display(),
                files = files,
                duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
                "Package installation completed"
            );
        }
        InstallEvent::Failed {
            package,
            phase,
            failure,
        } => {
            error!(
                target: "yama::events::install",
                package = %package,
                phase = ?phase,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Package installation failed"
            );
        }
        InstallEvent::Cancelled { package, phase } => {
            warn!(
                target: "yama::events::install",
                package = %package,
                phase = ?phase,
                "Package installation cancelled"
            );
        }
        InstallEvent::Removed {
            package,
            destination,
        } => {
            info!(
                target: "yama::events::install",
                package = %package,
                destination = %destination.display(),
                "Package removed"
            );
        }
    }
}
