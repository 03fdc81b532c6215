//! Path and symlink containment checks

mod paths;
mod symlinks;

pub use paths::{normalize_path, validate_entry_path};
pub use symlinks::{ensure_no_symlink_ancestors, resolve_link_target};
