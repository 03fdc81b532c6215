mod common;

use common::{entries, sample_package, write_archive, zip_package, ArchiveBuilder};
use std::path::Path;
use std::time::Duration;
use yama_errors::FailureKind;
use yama_hash::{tree_digest, HashAlgorithm};
use yama_install::{ArchiveExtractor, ArchiveFormat};
use yama_types::CancellationToken;

async fn extract_bytes(
    bytes: &[u8],
    temp: &Path,
) -> Result<yama_install::ExtractedTree, yama_errors::Error> {
    let archive = write_archive(temp, "pkg.archive", bytes);
    ArchiveExtractor::default()
        .extract(&archive, &temp.join("work"), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn extracts_tar_with_modes_and_links() {
    let temp = tempfile::tempdir().unwrap();
    let tree = extract_bytes(&sample_package("v1").tar(), temp.path())
        .await
        .unwrap();

    assert_eq!(tree.format, ArchiveFormat::Tar);
    assert_eq!(tree.stats.files, 3);
    assert_eq!(tree.stats.symlinks, 1);
    let root = temp.path().join("work");
    assert_eq!(
        std::fs::read_to_string(root.join("share/doc/README")).unwrap(),
        "v1"
    );
    assert_eq!(
        std::fs::read_link(root.join("lib/libfoo.so.1")).unwrap(),
        Path::new("libfoo.so")
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(root.join("bin/tool")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        let mode = std::fs::metadata(root.join("lib/libfoo.so")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}

#[tokio::test]
async fn compressed_variants_produce_identical_trees() {
    let mut digests = Vec::new();
    for (bytes, format) in [
        (sample_package("same").tar(), ArchiveFormat::Tar),
        (sample_package("same").tar_gz(), ArchiveFormat::TarGzip),
        (sample_package("same").tar_zst(), ArchiveFormat::TarZstd),
    ] {
        let temp = tempfile::tempdir().unwrap();
        let tree = extract_bytes(&bytes, temp.path()).await.unwrap();
        assert_eq!(tree.format, format);
        digests.push(
            tree_digest(HashAlgorithm::Blake3, &tree.root)
                .await
                .unwrap(),
        );
    }
    assert_eq!(digests[0], digests[1]);
    assert_eq!(digests[1], digests[2]);
}

#[tokio::test]
async fn extracts_zip() {
    let temp = tempfile::tempdir().unwrap();
    let tree = extract_bytes(&zip_package(), temp.path()).await.unwrap();
    assert_eq!(tree.format, ArchiveFormat::Zip);
    assert_eq!(
        std::fs::read_to_string(tree.root.join("share/README")).unwrap(),
        "from a zip"
    );
    assert_eq!(
        std::fs::read_link(tree.root.join("tool-link")).unwrap(),
        Path::new("bin/tool")
    );
}

#[tokio::test]
async fn parent_traversal_is_rejected_and_work_dir_left_empty() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new()
        .file("ok/first", b"written before the bad entry", 0o644)
        .raw_file("../../etc/passwd", b"root::0:0::/:/bin/sh")
        .tar();

    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
    assert!(entries(&temp.path().join("work")).is_empty());
    assert!(!temp.path().join("etc").exists());
}

#[tokio::test]
async fn absolute_entry_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new().raw_file("/tmp/yama-owned", b"x").tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
    assert!(entries(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn escaping_symlinks_are_rejected() {
    for target in ["/etc/passwd", "../../outside", "../sub/../../escape"] {
        let temp = tempfile::tempdir().unwrap();
        let bytes = ArchiveBuilder::new()
            .dir("sub", 0o755)
            .symlink("sub/link", target)
            .tar();
        let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
        assert_eq!(err.failure_kind(), FailureKind::PathTraversal, "{target}");
        assert!(entries(&temp.path().join("work")).is_empty());
    }
}

#[cfg(unix)]
#[tokio::test]
async fn writes_through_symlinks_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new()
        .dir("real", 0o755)
        .symlink("alias", "real")
        .file("alias/payload", b"x", 0o644)
        .tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_chains_cannot_escape() {
    // "here" -> "." passes the lexical check, and so does
    // "hop" -> "here/x/../.."; on disk the second resolves above the root
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new()
        .dir("x", 0o755)
        .symlink("here", ".")
        .symlink("hop", "here/x/../..")
        .tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
    assert!(entries(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn hard_links_must_target_archive_files() {
    let temp = tempfile::tempdir().unwrap();
    let ok = ArchiveBuilder::new()
        .file("bin/tool", b"tool", 0o755)
        .hard_link("bin/tool-alias", "bin/tool")
        .tar();
    let tree = extract_bytes(&ok, temp.path()).await.unwrap();
    assert_eq!(
        std::fs::read(tree.root.join("bin/tool-alias")).unwrap(),
        b"tool"
    );

    let temp = tempfile::tempdir().unwrap();
    let bad = ArchiveBuilder::new().hard_link("passwd", "../../etc/passwd").tar();
    let err = extract_bytes(&bad, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
}

#[cfg(unix)]
#[tokio::test]
async fn hard_links_cannot_reach_through_a_replaced_directory() {
    // "dir" is swapped for a link that escapes through a chain, a hard link
    // is taken through it, then "dir" becomes a real directory again
    let temp = tempfile::tempdir().unwrap();
    let outside = temp.path().join("outside");
    std::fs::create_dir(&outside).unwrap();
    std::fs::write(outside.join("secret"), b"host file").unwrap();

    let bytes = ArchiveBuilder::new()
        .dir("dir", 0o755)
        .file("dir/secret", b"packaged", 0o644)
        .dir("s1/s2", 0o755)
        .symlink("s1/s2/l", "../..")
        .symlink("dir", "s1/s2/l/../outside")
        .hard_link("stolen", "dir/secret")
        .dir("dir", 0o755)
        .tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
    assert!(entries(&temp.path().join("work")).is_empty());
    assert_eq!(std::fs::read(outside.join("secret")).unwrap(), b"host file");

    use std::os::unix::fs::MetadataExt;
    assert_eq!(std::fs::metadata(outside.join("secret")).unwrap().nlink(), 1);
}

#[tokio::test]
async fn hard_links_to_replaced_files_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new()
        .file("lib/libfoo.so", b"elf", 0o644)
        .dir("lib", 0o755)
        .symlink("lib", "share")
        .hard_link("libfoo-copy.so", "lib/libfoo.so")
        .tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::PathTraversal);
}

#[tokio::test]
async fn device_nodes_are_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = ArchiveBuilder::new().char_device("dev/null").tar();
    let err = extract_bytes(&bytes, temp.path()).await.unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::CorruptArchive);
}

#[tokio::test]
async fn truncated_archive_is_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let full = sample_package("cut").tar_gz();
    let err = extract_bytes(&full[..full.len() / 2], temp.path())
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::CorruptArchive);
    assert!(entries(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn unknown_format_is_corrupt() {
    let temp = tempfile::tempdir().unwrap();
    let err = extract_bytes(b"<!doctype html><p>not found</p>", temp.path())
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::CorruptArchive);
}

#[tokio::test]
async fn cancelled_before_start() {
    let temp = tempfile::tempdir().unwrap();
    let archive = write_archive(temp.path(), "pkg.tar", &sample_package("c").tar());
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = ArchiveExtractor::default()
        .extract(&archive, &temp.path().join("work"), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(entries(&temp.path().join("work")).is_empty());
}

#[tokio::test]
async fn zero_timeout_aborts_extraction() {
    let temp = tempfile::tempdir().unwrap();
    let mut builder = ArchiveBuilder::new();
    let blob = vec![7u8; 256 * 1024];
    for i in 0..64 {
        builder = builder.file(&format!("data/blob-{i}"), &blob, 0o644);
    }
    let archive = write_archive(temp.path(), "big.tar", &builder.tar());

    let err = ArchiveExtractor::new(Duration::ZERO)
        .extract(&archive, &temp.path().join("work"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.failure_kind(), FailureKind::Timeout);
    assert!(entries(&temp.path().join("work")).is_empty());
}
