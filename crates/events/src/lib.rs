#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in yama
//!
//! Library crates never print or log directly. They emit [`AppEvent`]s
//! through an optional [`EventSender`]; the CLI drains the channel and turns
//! each event into a tracing record. A dropped receiver is not an error.

pub mod events;
pub use events::{
    AppEvent, DownloadEvent, FailureContext, GeneralEvent, InstallEvent, InstallPhase,
};

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub type EventSender = UnboundedSender<AppEvent>;

pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout yama
///
/// Implemented by the raw `EventSender` and by any component that may or
/// may not carry one.
pub trait EventEmitter {
    fn event_sender(&self) -> Option<&EventSender>;

    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Receiver gone means nobody is listening
            let _ = sender.send(event);
        }
    }

    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    fn emit_install_phase(&self, package: impl Into<String>, phase: InstallPhase) {
        self.emit(AppEvent::Install(InstallEvent::PhaseChanged {
            package: package.into(),
            phase,
        }));
    }

    fn emit_install_started(&self, package: impl Into<String>, destination: PathBuf) {
        self.emit(AppEvent::Install(InstallEvent::Started {
            package: package.into(),
            destination,
        }));
    }

    fn emit_install_completed(
        &self,
        package: impl Into<String>,
        destination: PathBuf,
        files: usize,
        duration: Duration,
    ) {
        self.emit(AppEvent::Install(InstallEvent::Completed {
            package: package.into(),
            destination,
            files,
            duration,
        }));
    }
}

impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}
