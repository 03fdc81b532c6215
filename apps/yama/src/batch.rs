//! Package references from the command line and from batch files

use crate::error::CliError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use yama_hash::{Hash, HashAlgorithm};
use yama_install::PackageRef;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchFile {
    #[serde(default, rename = "package")]
    packages: Vec<BatchEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchEntry {
    name: String,
    url: String,
    digest: String,
    dest: PathBuf,
}

/// Build a package reference from `install` arguments
pub fn package_from_args(
    name: &str,
    url: &str,
    digest: &str,
    dest: &Path,
    default_algorithm: HashAlgorithm,
) -> Result<PackageRef, CliError> {
    let expected = Hash::parse(digest, default_algorithm)
        .map_err(|e| CliError::InvalidArguments(format!("--digest {digest}: {e}")))?;
    Ok(PackageRef::new(name, url, expected, dest)?)
}

/// Read a batch file
///
/// Relative destinations are resolved against the batch file's directory.
pub async fn load_batch(
    path: &Path,
    default_algorithm: HashAlgorithm,
) -> Result<Vec<PackageRef>, CliError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::InvalidArguments(format!("{}: {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_batch(&contents, base, default_algorithm)
        .map_err(|e| CliError::InvalidArguments(format!("{}: {e}", path.display())))
}

fn parse_batch(
    contents: &str,
    base: &Path,
    default_algorithm: HashAlgorithm,
) -> Result<Vec<PackageRef>, String> {
    let file: BatchFile = toml::from_str(contents).map_err(|e| e.to_string())?;
    if file.packages.is_empty() {
        return Err("no [[package]] entries".to_string());
    }

    file.packages
        .into_iter()
        .map(|entry| {
            let dest = if entry.dest.is_absolute() {
                entry.dest
            } else {
                base.join(entry.dest)
            };
            package_from_args(&entry.name, &entry.url, &entry.digest, &dest, default_algorithm)
                .map_err(|e| format!("package {}: {e}", entry.name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

    #[test]
    fn parses_packages_in_order() {
        let contents = format!(
            r#"
[[package]]
name = "zlib"
url = "https://example/zlib-1.3.tar.gz"
digest = "blake3:{DIGEST}"
dest = "/opt/zlib"

[[package]]
name = "libfoo"
url = "https://example/libfoo-1.0.tar.zst"
digest = "{DIGEST}"
dest = "pkgs/libfoo"
"#
        );
        let packages = parse_batch(&contents, Path::new("/srv/batches"), HashAlgorithm::Sha256)
            .unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "zlib");
        assert_eq!(packages[0].expected_digest.algorithm(), HashAlgorithm::Blake3);
        assert_eq!(packages[1].expected_digest.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(
            packages[1].destination_path,
            PathBuf::from("/srv/batches/pkgs/libfoo")
        );
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(parse_batch("", Path::new("/"), HashAlgorithm::Blake3).is_err());

        let unknown_field = format!(
            "[[package]]\nname = \"a\"\nurl = \"https://x/a\"\ndigest = \"{DIGEST}\"\ndest = \"/a\"\nversion = \"1\"\n"
        );
        assert!(parse_batch(&unknown_field, Path::new("/"), HashAlgorithm::Blake3).is_err());

        let short_digest =
            "[[package]]\nname = \"a\"\nurl = \"https://x/a\"\ndigest = \"abcd\"\ndest = \"/a\"\n";
        let err = parse_batch(short_digest, Path::new("/"), HashAlgorithm::Blake3).unwrap_err();
        assert!(err.contains("package a"));
    }
}
