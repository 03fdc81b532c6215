use super::writer::TreeWriter;
use crate::validation::validate_entry_path;
use std::io::Read;
use std::path::Path;
use yama_errors::{Error, InstallError};

/// Unpack a (possibly decompressed) tar stream through the tree writer
pub(super) fn unpack<R: Read>(
    reader: R,
    writer: &mut TreeWriter<'_>,
    archive_path: &Path,
) -> Result<(), Error> {
    let corrupt = |message: String| -> Error {
        InstallError::CorruptArchive {
            path: archive_path.display().to_string(),
            message,
        }
        .into()
    };

    let mut archive = tar::Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| corrupt(format!("failed to read entries: {e}")))?;

    for entry in entries {
        writer.check_abort()?;
        let mut entry = entry.map_err(|e| corrupt(format!("failed to read entry: {e}")))?;
        let kind = entry.header().entry_type();

        if kind.is_pax_global_extensions()
            || kind.is_pax_local_extensions()
            || kind.is_gnu_longname()
            || kind.is_gnu_longlink()
        {
            continue;
        }

        let raw = entry
            .path()
            .map_err(|e| corrupt(format!("invalid entry name: {e}")))?
            .into_owned();
        let relative = validate_entry_path(&raw)?;
        let mode = entry.header().mode().ok();

        if kind.is_dir() {
            writer.directory(&relative, mode)?;
        } else if kind.is_file() || kind.is_contiguous() {
            writer.file(&relative, &mut entry, mode)?;
        } else if kind.is_symlink() {
            let target = link_name(&entry, &raw, &corrupt)?;
            writer.symlink(&relative, &target)?;
        } else if kind.is_hard_link() {
            let target = link_name(&entry, &raw, &corrupt)?;
            let existing = validate_entry_path(&target)?;
            writer.hard_link(&relative, &existing)?;
        } else {
            return Err(corrupt(format!(
                "unsupported entry type {:?} for {}",
                kind,
                raw.display()
            )));
        }
    }
    Ok(())
}

fn link_name<R: Read>(
    entry: &tar::Entry<'_, R>,
    raw: &Path,
    corrupt: &dyn Fn(String) -> Error,
) -> Result<std::path::PathBuf, Error> {
    entry
        .link_name()
        .map_err(|e| corrupt(format!("invalid link target for {}: {e}", raw.display())))?
        .map(std::borrow::Cow::into_owned)
        .ok_or_else(|| corrupt(format!("link {} has no target", raw.display())))
}
