//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::{Style, Term};
use yama_events::{AppEvent, DownloadEvent, GeneralEvent, InstallEvent};

/// Turns pipeline events into log records and, unless quiet, status lines
pub struct EventHandler {
    term: Term,
    quiet: bool,
    verbose: bool,
    ok: Style,
    warn: Style,
    err: Style,
    dim: Style,
}

impl EventHandler {
    pub fn new(colors: bool, quiet: bool, verbose: bool) -> Self {
        let style = |s: Style| s.force_styling(colors);
        Self {
            term: Term::stderr(),
            quiet,
            verbose,
            ok: style(Style::new().green()),
            warn: style(Style::new().yellow()),
            err: style(Style::new().red().bold()),
            dim: style(Style::new().dim()),
        }
    }

    pub fn handle_event(&mut self, event: &AppEvent) {
        log_event_with_tracing(event);
        if self.quiet {
            return;
        }
        if let Some(line) = self.status_line(event) {
            let _ = self.term.write_line(&line);
        }
    }

    fn status_line(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::Install(InstallEvent::Started {
                package,
                destination,
            }) => Some(format!(
                "Installing {package} {}",
                self.dim.apply_to(format!("→ {}", destination.display()))
            )),
            AppEvent::Install(InstallEvent::PhaseChanged { package, phase }) if self.verbose => {
                Some(self.dim.apply_to(format!("  {package}: {phase}")).to_string())
            }
            AppEvent::Install(InstallEvent::Completed {
                package, files, ..
            }) => Some(format!(
                "{} {package} ({files} files)",
                self.ok.apply_to("Installed")
            )),
            AppEvent::Install(InstallEvent::Failed {
                package, failure, ..
            }) => Some(format!(
                "{} {package}: {}",
                self.err.apply_to("Failed"),
                failure.message
            )),
            AppEvent::Install(InstallEvent::Cancelled { package, .. }) => Some(format!(
                "{} {package}",
                self.warn.apply_to("Cancelled")
            )),
            AppEvent::Install(InstallEvent::Removed {
                package,
                destination,
            }) => Some(format!(
                "{} {package} from {}",
                self.ok.apply_to("Removed"),
                destination.display()
            )),
            AppEvent::Download(DownloadEvent::Retrying {
                url,
                attempt,
                max_attempts,
                reason,
                ..
            }) => Some(format!(
                "{} {url} ({attempt}/{max_attempts}): {reason}",
                self.warn.apply_to("Retrying")
            )),
            AppEvent::Download(DownloadEvent::Resuming {
                url, resume_offset, ..
            }) if self.verbose => Some(
                self.dim
                    .apply_to(format!("  resuming {url} at byte {resume_offset}"))
                    .to_string(),
            ),
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                let label = self.warn.apply_to("Warning:");
                Some(match context {
                    Some(context) => format!("{label} {message} ({context})"),
                    None => format!("{label} {message}"),
                })
            }
            _ => None,
        }
    }
}
