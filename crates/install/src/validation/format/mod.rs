mod detection;

pub use detection::{detect_format, ArchiveFormat};
