#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tar::{EntryType, Header};
use yama_hash::{Hash, HashAlgorithm};
use yama_install::{InstallConfig, PackageRef};
use yama_net::{PackageDownloadConfig, RetryConfig};

/// Builds tar archives in memory, including entries `tar::Builder` refuses
pub struct ArchiveBuilder {
    builder: tar::Builder<Vec<u8>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            builder: tar::Builder::new(Vec::new()),
        }
    }

    pub fn dir(mut self, path: &str, mode: u32) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(mode);
        header.set_size(0);
        self.builder
            .append_data(&mut header, path, std::io::empty())
            .unwrap();
        self
    }

    pub fn file(mut self, path: &str, contents: &[u8], mode: u32) -> Self {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(mode);
        header.set_size(contents.len() as u64);
        self.builder
            .append_data(&mut header, path, contents)
            .unwrap();
        self
    }

    pub fn symlink(self, path: &str, target: &str) -> Self {
        self.raw(path.as_bytes(), EntryType::Symlink, target.as_bytes(), b"")
    }

    pub fn hard_link(self, path: &str, target: &str) -> Self {
        self.raw(path.as_bytes(), EntryType::Link, target.as_bytes(), b"")
    }

    /// A regular file whose name is written verbatim into the header
    pub fn raw_file(self, name: &str, contents: &[u8]) -> Self {
        self.raw(name.as_bytes(), EntryType::Regular, b"", contents)
    }

    pub fn char_device(self, path: &str) -> Self {
        self.raw(path.as_bytes(), EntryType::Char, b"", b"")
    }

    fn raw(mut self, name: &[u8], kind: EntryType, link: &[u8], contents: &[u8]) -> Self {
        let mut header = Header::new_ustar();
        {
            let old = header.as_old_mut();
            old.name[..name.len()].copy_from_slice(name);
            old.linkname[..link.len()].copy_from_slice(link);
        }
        header.set_entry_type(kind);
        header.set_mode(0o644);
        header.set_size(contents.len() as u64);
        header.set_cksum();
        self.builder.append(&header, contents).unwrap();
        self
    }

    pub fn tar(self) -> Vec<u8> {
        self.builder.into_inner().unwrap()
    }

    pub fn tar_gz(self) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&self.tar()).unwrap();
        encoder.finish().unwrap()
    }

    pub fn tar_zst(self) -> Vec<u8> {
        zstd::stream::encode_all(self.tar().as_slice(), 3).unwrap()
    }
}

/// A small but realistic package layout
pub fn sample_package(marker: &str) -> ArchiveBuilder {
    ArchiveBuilder::new()
        .dir("bin", 0o755)
        .file("bin/tool", format!("#!/bin/sh\necho {marker}\n").as_bytes(), 0o755)
        .file("lib/libfoo.so", b"\x7fELF not really", 0o644)
        .symlink("lib/libfoo.so.1", "libfoo.so")
        .file("share/doc/README", marker.as_bytes(), 0o644)
}

pub fn zip_package() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let exec = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    let plain = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
    writer.add_directory("bin/", exec).unwrap();
    writer.start_file("bin/tool", exec).unwrap();
    writer.write_all(b"#!/bin/sh\necho zip\n").unwrap();
    writer.start_file("share/README", plain).unwrap();
    writer.write_all(b"from a zip").unwrap();
    writer.add_symlink("tool-link", "bin/tool", plain).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path).unwrap().to_string()
}

pub fn blake3_of(bytes: &[u8]) -> Hash {
    Hash::from_data(HashAlgorithm::Blake3, bytes)
}

pub fn package_ref(name: &str, url: &str, digest: Hash, destination: &Path) -> PackageRef {
    PackageRef::new(name, url, digest, destination).unwrap()
}

/// Config rooted in a temp directory with fast retries
pub fn test_config(root: &Path) -> InstallConfig {
    let download = PackageDownloadConfig {
        retry_config: RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            ..RetryConfig::default()
        },
        ..PackageDownloadConfig::default()
    };
    InstallConfig {
        download,
        ..InstallConfig::default()
    }
    .with_staging_root(root.join("staging"))
    .with_registry(root.join("state/installed_packages.json"))
}

/// Entry names in `dir`, sorted; empty if `dir` is missing
pub fn entries(dir: &Path) -> Vec<String> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<_> = read
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
