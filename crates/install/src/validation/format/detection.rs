//! Archive format detection from magic bytes
//!
//! File names and URLs are not trusted; only the leading bytes decide.

use std::io::Read;
use std::path::Path;
use yama_errors::{Error, InstallError};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const ZIP_LOCAL_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];
const ZIP_EMPTY_MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];
const USTAR_OFFSET: usize = 257;
const TAR_BLOCK: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGzip,
    TarZstd,
    Zip,
}

impl ArchiveFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::TarGzip => "tar.gz",
            Self::TarZstd => "tar.zst",
            Self::Zip => "zip",
        }
    }
}

/// Sniff the archive format of a file
///
/// # Errors
///
/// Returns `CorruptArchive` if no known signature matches, or an I/O error
/// if the file cannot be read.
pub fn detect_format(path: &Path) -> Result<ArchiveFormat, Error> {
    let mut file = std::fs::File::open(path).map_err(|e| Error::io_with_path(&e, path))?;
    let mut header = [0u8; TAR_BLOCK];
    let mut filled = 0;
    while filled < header.len() {
        let n = file
            .read(&mut header[filled..])
            .map_err(|e| Error::io_with_path(&e, path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    detect_from_bytes(&header[..filled]).ok_or_else(|| {
        InstallError::CorruptArchive {
            path: path.display().to_string(),
            message: "unrecognised archive format".to_string(),
        }
        .into()
    })
}

fn detect_from_bytes(bytes: &[u8]) -> Option<ArchiveFormat> {
    if bytes.starts_with(&GZIP_MAGIC) {
        return Some(ArchiveFormat::TarGzip);
    }
    if bytes.starts_with(&ZSTD_MAGIC) {
        return Some(ArchiveFormat::TarZstd);
    }
    if bytes.starts_with(&ZIP_LOCAL_MAGIC) || bytes.starts_with(&ZIP_EMPTY_MAGIC) {
        return Some(ArchiveFormat::Zip);
    }
    if bytes.len() >= USTAR_OFFSET + 5 && &bytes[USTAR_OFFSET..USTAR_OFFSET + 5] == b"ustar" {
        return Some(ArchiveFormat::Tar);
    }
    // An archive with no entries is just end-of-archive zero blocks
    if bytes.len() == TAR_BLOCK && bytes.iter().all(|b| *b == 0) {
        return Some(ArchiveFormat::Tar);
    }
    None
}
