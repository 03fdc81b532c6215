mod guard;

pub use guard::ScopedDir;
