//! Validation applied to archive contents before anything touches disk

pub mod format;
pub mod security;

pub use format::{detect_format, ArchiveFormat};
pub use security::{normalize_path, resolve_link_target, validate_entry_path};
