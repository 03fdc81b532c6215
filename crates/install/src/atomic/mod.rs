//! Atomic publish of extracted trees
//!
//! Observers of a destination see either the previous tree or the complete
//! new one. The previous tree is moved aside to a hidden sibling, the new
//! tree is renamed in, and the old one is deleted only after that rename
//! succeeded. Any failure renames the old tree back.

mod publish;

pub use publish::{publish, remove_tree, PublishOutcome};
