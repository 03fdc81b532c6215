//! Contained writes into a work directory
//!
//! Every archive front end funnels entries through `TreeWriter`, which owns
//! the containment rules: validated relative paths only, no writing through
//! symlinks, symlink targets resolved inside the root.

use super::AbortSignal;
use crate::validation::security::{ensure_no_symlink_ancestors, resolve_link_target};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use yama_errors::{Error, InstallError};

const COPY_BUFFER: usize = 64 * 1024;

/// Counts of what landed in the work directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    pub bytes: u64,
}

pub(crate) struct TreeWriter<'a> {
    root: PathBuf,
    abort: &'a AbortSignal,
    stats: TreeStats,
    dir_modes: Vec<(PathBuf, u32)>,
    symlinks: Vec<PathBuf>,
    regular_files: HashSet<PathBuf>,
    buffer: Vec<u8>,
}

impl<'a> TreeWriter<'a> {
    pub(crate) fn new(root: &Path, abort: &'a AbortSignal) -> Self {
        Self {
            root: root.to_path_buf(),
            abort,
            stats: TreeStats::default(),
            dir_modes: Vec::new(),
            symlinks: Vec::new(),
            regular_files: HashSet::new(),
            buffer: vec![0; COPY_BUFFER],
        }
    }

    pub(crate) fn check_abort(&self) -> Result<(), Error> {
        self.abort.check()
    }

    pub(crate) fn directory(&mut self, relative: &Path, mode: Option<u32>) -> Result<(), Error> {
        if relative.as_os_str().is_empty() {
            return Ok(());
        }
        ensure_no_symlink_ancestors(&self.root, relative)?;
        let target = self.root.join(relative);
        if let Ok(meta) = fs::symlink_metadata(&target) {
            if !meta.is_dir() {
                remove_entry(&target)?;
                self.forget_files_under(relative);
            }
        }
        create_dirs_below(&self.root, relative)?;
        self.stats.directories += 1;
        if let Some(mode) = mode {
            self.dir_modes.push((target, mode));
        }
        Ok(())
    }

    pub(crate) fn file(
        &mut self,
        relative: &Path,
        reader: &mut dyn Read,
        mode: Option<u32>,
    ) -> Result<(), Error> {
        if relative.as_os_str().is_empty() {
            return Err(corrupt(relative, "file entry has no name"));
        }
        let target = self.prepare_leaf(relative)?;

        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| Error::io_with_path(&e, &target))?;

        loop {
            self.abort.check()?;
            let n = reader
                .read(&mut self.buffer)
                .map_err(|e| corrupt(relative, &e.to_string()))?;
            if n == 0 {
                break;
            }
            out.write_all(&self.buffer[..n])
                .map_err(|e| Error::io_with_path(&e, &target))?;
            self.stats.bytes += n as u64;
        }
        out.flush().map_err(|e| Error::io_with_path(&e, &target))?;
        drop(out);

        if let Some(mode) = mode {
            set_mode(&target, sanitize_mode(mode))?;
        }
        self.stats.files += 1;
        self.regular_files.insert(relative.to_path_buf());
        Ok(())
    }

    pub(crate) fn symlink(&mut self, relative: &Path, link_target: &Path) -> Result<(), Error> {
        resolve_link_target(relative, link_target)?;
        let target = self.prepare_leaf(relative)?;
        create_symlink(link_target, &target)?;
        self.stats.symlinks += 1;
        self.symlinks.push(relative.to_path_buf());
        Ok(())
    }

    /// Hard links may only point at regular files already written by this
    /// archive and still reachable without passing through a symlink
    pub(crate) fn hard_link(&mut self, relative: &Path, existing: &Path) -> Result<(), Error> {
        let unsafe_link = || -> Error {
            InstallError::UnsafeSymlink {
                entry: relative.display().to_string(),
                target: existing.display().to_string(),
            }
            .into()
        };
        if !self.regular_files.contains(existing) {
            return Err(unsafe_link());
        }
        ensure_no_symlink_ancestors(&self.root, existing)?;
        let source = self.root.join(existing);
        if !fs::symlink_metadata(&source).is_ok_and(|meta| meta.file_type().is_file()) {
            return Err(unsafe_link());
        }
        let target = self.prepare_leaf(relative)?;
        fs::hard_link(&source, &target).map_err(|e| Error::io_with_path(&e, &target))?;
        self.stats.files += 1;
        self.regular_files.insert(relative.to_path_buf());
        Ok(())
    }

    /// Apply deferred directory modes and re-check symlinks against the real tree
    pub(crate) fn finish(mut self) -> Result<TreeStats, Error> {
        self.verify_symlinks()?;

        // Deepest first, so a read-only parent never blocks a child chmod
        self.dir_modes
            .sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        for (path, mode) in &self.dir_modes {
            set_mode(path, sanitize_mode(*mode) | 0o700)?;
        }
        Ok(self.stats)
    }

    /// Lexical checks cannot see through chains of links, so resolve each
    /// link on disk once everything exists
    fn verify_symlinks(&self) -> Result<(), Error> {
        if self.symlinks.is_empty() {
            return Ok(());
        }
        let root = fs::canonicalize(&self.root).map_err(|e| Error::io_with_path(&e, &self.root))?;
        for link in &self.symlinks {
            let path = self.root.join(link);
            match fs::canonicalize(&path) {
                Ok(resolved) if resolved.starts_with(&root) => {}
                Ok(resolved) => {
                    return Err(InstallError::UnsafeSymlink {
                        entry: link.display().to_string(),
                        target: resolved.display().to_string(),
                    }
                    .into());
                }
                // Dangling links were already checked lexically
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io_with_path(&e, &path)),
            }
        }
        Ok(())
    }

    fn prepare_leaf(&mut self, relative: &Path) -> Result<PathBuf, Error> {
        ensure_no_symlink_ancestors(&self.root, relative)?;
        if let Some(parent) = relative.parent() {
            create_dirs_below(&self.root, parent)?;
        }
        let target = self.root.join(relative);
        // Later entries replace earlier ones, never write through them
        if fs::symlink_metadata(&target).is_ok() {
            remove_entry(&target)?;
            self.forget_files_under(relative);
        }
        Ok(target)
    }

    /// A replaced entry takes every file recorded beneath it along
    fn forget_files_under(&mut self, relative: &Path) {
        self.regular_files.retain(|path| !path.starts_with(relative));
    }
}

/// Create the directories of `relative` one level at a time below `root`
///
/// Never recreates `root` itself, so a worker outliving its abort cannot
/// resurrect a work directory that was already removed.
fn create_dirs_below(root: &Path, relative: &Path) -> Result<(), Error> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::create_dir(&current) {
            Ok(()) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::AlreadyExists
                    && fs::symlink_metadata(&current).is_ok_and(|meta| meta.is_dir()) => {}
            Err(e) => return Err(Error::io_with_path(&e, &current)),
        }
    }
    Ok(())
}

fn corrupt(entry: &Path, message: &str) -> Error {
    InstallError::CorruptArchive {
        path: entry.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

fn remove_entry(path: &Path) -> Result<(), Error> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::io_with_path(&e, path))?;
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::io_with_path(&e, path))
}

/// setuid and setgid are never restored
fn sanitize_mode(mode: u32) -> u32 {
    mode & 0o7777 & !0o6000
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::io_with_path(&e, path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), Error> {
    Ok(())
}

#[cfg(unix)]
fn create_symlink(link_target: &Path, at: &Path) -> Result<(), Error> {
    std::os::unix::fs::symlink(link_target, at).map_err(|e| Error::io_with_path(&e, at))
}

#[cfg(not(unix))]
fn create_symlink(_link_target: &Path, at: &Path) -> Result<(), Error> {
    Err(InstallError::FilesystemError {
        operation: "symlink".to_string(),
        path: at.display().to_string(),
        message: "symlinks are not supported on this platform".to_string(),
    }
    .into())
}

/// Remove everything inside `dir`, keeping `dir` itself
pub(crate) fn clear_dir_contents(dir: &Path) -> Result<(), Error> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io_with_path(&e, dir)),
    };
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_with_path(&e, dir))?;
        remove_entry(&entry.path())?;
    }
    Ok(())
}
