use super::writer::TreeWriter;
use crate::validation::validate_entry_path;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use yama_errors::{Error, InstallError};

/// Unpack a zip archive through the tree writer
pub(super) fn unpack(file: File, writer: &mut TreeWriter<'_>, archive_path: &Path) -> Result<(), Error> {
    let corrupt = |message: String| -> Error {
        InstallError::CorruptArchive {
            path: archive_path.display().to_string(),
            message,
        }
        .into()
    };

    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;

    for index in 0..archive.len() {
        writer.check_abort()?;
        let mut entry = archive
            .by_index(index)
            .map_err(|e| corrupt(format!("entry {index}: {e}")))?;

        let raw = PathBuf::from(entry.name());
        let relative = validate_entry_path(&raw)?;
        let mode = entry.unix_mode();

        if entry.is_dir() {
            writer.directory(&relative, mode)?;
        } else if entry.is_symlink() {
            let mut target = String::new();
            entry
                .read_to_string(&mut target)
                .map_err(|e| corrupt(format!("invalid link target for {}: {e}", raw.display())))?;
            writer.symlink(&relative, Path::new(&target))?;
        } else {
            writer.file(&relative, &mut entry, mode)?;
        }
    }
    Ok(())
}
