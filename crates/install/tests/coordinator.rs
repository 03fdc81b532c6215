mod common;

use common::{
    blake3_of, entries, file_url, package_ref, sample_package, test_config, write_archive,
    ArchiveBuilder,
};
use httpmock::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use yama_errors::FailureKind;
use yama_events::{AppEvent, InstallEvent, InstallPhase};
use yama_hash::{tree_digest, HashAlgorithm};
use yama_install::{
    ArchiveExtractor, InstallCoordinator, InstallPool, InstallStatus, PackageRef,
};
use yama_types::{CancellationToken, LockMode};

/// Archive served from a file:// URL, plus the package pointing at it
fn local_package(temp: &Path, name: &str, bytes: &[u8], dest: &Path) -> PackageRef {
    let archive = write_archive(temp, &format!("{name}.tar"), bytes);
    package_ref(name, &file_url(&archive), blake3_of(bytes), dest)
}

fn no_leftovers(temp: &Path, dest_parent: &Path) {
    assert!(entries(&temp.join("staging")).is_empty(), "staging not cleaned");
    let hidden: Vec<_> = entries(dest_parent)
        .into_iter()
        .filter(|name| name.contains(".yama-"))
        .collect();
    assert!(hidden.is_empty(), "leftovers beside destination: {hidden:?}");
}

#[tokio::test]
async fn install_publishes_exactly_the_archive_tree() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = sample_package("v1").tar_gz();
    let dest = temp.path().join("pkgs/libfoo");
    let package = local_package(temp.path(), "libfoo", &bytes, &dest);

    let (tx, mut rx) = yama_events::channel();
    let coordinator = InstallCoordinator::new(test_config(temp.path()))
        .unwrap()
        .with_event_sender(tx);
    let result = coordinator.install(&package).await;

    assert_eq!(result.status, InstallStatus::Success);
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.files, 3);

    // Round trip: the destination matches a fresh extraction of the archive
    let reference = tempfile::tempdir().unwrap();
    let archive = write_archive(reference.path(), "ref.tar.gz", &bytes);
    let fresh = ArchiveExtractor::default()
        .extract(&archive, &reference.path().join("tree"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        tree_digest(HashAlgorithm::Blake3, &dest).await.unwrap(),
        tree_digest(HashAlgorithm::Blake3, &fresh.root).await.unwrap()
    );
    no_leftovers(temp.path(), &temp.path().join("pkgs"));

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::Install(InstallEvent::PhaseChanged { phase, .. }) = event {
            phases.push(phase);
        }
    }
    assert_eq!(
        phases,
        [
            InstallPhase::AcquiringLock,
            InstallPhase::Fetching,
            InstallPhase::Verifying,
            InstallPhase::Extracting,
            InstallPhase::Publishing,
        ]
    );

    let record = coordinator
        .registry()
        .unwrap()
        .get("libfoo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.destination, dest);
    assert_eq!(record.files, 3);
}

#[tokio::test]
async fn reinstall_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let bytes = sample_package("same").tar();
    let dest = temp.path().join("libfoo");
    let package = local_package(temp.path(), "libfoo", &bytes, &dest);
    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();

    assert!(coordinator.install(&package).await.is_success());
    let first = tree_digest(HashAlgorithm::Blake3, &dest).await.unwrap();
    assert!(coordinator.install(&package).await.is_success());
    let second = tree_digest(HashAlgorithm::Blake3, &dest).await.unwrap();

    assert_eq!(first, second);
    no_leftovers(temp.path(), temp.path());
}

#[tokio::test]
async fn upgrade_replaces_previous_tree() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();

    let old = local_package(temp.path(), "libfoo", &sample_package("old").tar(), &dest);
    assert!(coordinator.install(&old).await.is_success());
    std::fs::write(dest.join("local-only"), "removed by upgrade").unwrap();

    let new_bytes = ArchiveBuilder::new()
        .file("share/doc/README", b"new", 0o644)
        .tar();
    let archive = write_archive(temp.path(), "libfoo-2.tar", &new_bytes);
    let new = package_ref("libfoo", &file_url(&archive), blake3_of(&new_bytes), &dest);
    assert!(coordinator.install(&new).await.is_success());

    assert_eq!(
        std::fs::read_to_string(dest.join("share/doc/README")).unwrap(),
        "new"
    );
    assert!(!dest.join("bin/tool").exists());
    assert!(!dest.join("local-only").exists());
    no_leftovers(temp.path(), temp.path());
}

#[tokio::test]
async fn digest_mismatch_leaves_destination_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("marker"), "previous install").unwrap();

    let bytes = sample_package("v2").tar();
    let archive = write_archive(temp.path(), "libfoo.tar", &bytes);
    let package = package_ref(
        "libfoo",
        &file_url(&archive),
        blake3_of(b"something else entirely"),
        &dest,
    );

    let (tx, mut rx) = yama_events::channel();
    let coordinator = InstallCoordinator::new(test_config(temp.path()))
        .unwrap()
        .with_event_sender(tx);
    let result = coordinator.install(&package).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::DigestMismatch));
    assert_eq!(result.exit_code(), FailureKind::DigestMismatch.exit_code());
    assert_eq!(
        std::fs::read_to_string(dest.join("marker")).unwrap(),
        "previous install"
    );
    assert_eq!(entries(&dest), ["marker"]);
    no_leftovers(temp.path(), temp.path());
    assert!(coordinator.registry().unwrap().list().await.unwrap().is_empty());

    let mut failed_phase = None;
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::Install(InstallEvent::Failed { phase, .. }) = event {
            failed_phase = phase;
        }
    }
    assert_eq!(failed_phase, Some(InstallPhase::Verifying));
}

#[tokio::test]
async fn malicious_archive_fails_without_side_effects() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("pkgs/evil");
    let bytes = ArchiveBuilder::new()
        .file("README", b"looks harmless", 0o644)
        .raw_file("../../etc/passwd", b"owned")
        .tar();
    let package = local_package(temp.path(), "evil", &bytes, &dest);

    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();
    let result = coordinator.install(&package).await;

    assert_eq!(result.failure_kind(), Some(FailureKind::PathTraversal));
    assert!(!dest.exists());
    assert!(!temp.path().join("etc").exists());
    no_leftovers(temp.path(), &temp.path().join("pkgs"));
}

#[tokio::test]
async fn fail_fast_reports_already_installing() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let package = local_package(temp.path(), "libfoo", &sample_package("x").tar(), &dest);
    let coordinator = InstallCoordinator::new(
        test_config(temp.path()).with_lock_mode(LockMode::FailFast),
    )
    .unwrap();

    let held = coordinator
        .locks()
        .acquire(&dest, LockMode::Wait, &CancellationToken::new())
        .await
        .unwrap();
    let result = coordinator.install(&package).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::AlreadyInstalling));
    assert!(!dest.exists());

    drop(held);
    assert!(coordinator.install(&package).await.is_success());
}

#[tokio::test]
async fn wait_mode_serialises_same_destination() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let package = local_package(temp.path(), "libfoo", &sample_package("x").tar(), &dest);
    let coordinator = Arc::new(InstallCoordinator::new(test_config(temp.path())).unwrap());

    let held = coordinator
        .locks()
        .acquire(&dest, LockMode::Wait, &CancellationToken::new())
        .await
        .unwrap();

    let waiting = {
        let coordinator = Arc::clone(&coordinator);
        let package = package.clone();
        tokio::spawn(async move { coordinator.install(&package).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!waiting.is_finished());
    assert!(!dest.exists());

    drop(held);
    let result = waiting.await.unwrap();
    assert!(result.is_success());
    assert!(coordinator.locks().is_empty());
}

#[tokio::test]
async fn concurrent_installs_of_one_destination_both_succeed() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let bytes = sample_package("race").tar();
    let package = local_package(temp.path(), "libfoo", &bytes, &dest);
    let coordinator = Arc::new(InstallCoordinator::new(test_config(temp.path())).unwrap());

    let (a, b) = tokio::join!(coordinator.install(&package), coordinator.install(&package));
    assert!(a.is_success());
    assert!(b.is_success());
    assert_eq!(
        std::fs::read_to_string(dest.join("share/doc/README")).unwrap(),
        "race"
    );
    no_leftovers(temp.path(), temp.path());
}

#[tokio::test]
async fn cancelled_install_reports_cancelled() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let package = local_package(temp.path(), "libfoo", &sample_package("x").tar(), &dest);
    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = coordinator.install_with_cancel(&package, &cancel).await;

    assert_eq!(result.status, InstallStatus::Cancelled);
    assert_eq!(result.exit_code(), FailureKind::Cancelled.exit_code());
    assert!(!dest.exists());
    no_leftovers(temp.path(), temp.path());
}

#[tokio::test]
async fn http_install_and_http_failure() {
    let server = MockServer::start_async().await;
    let bytes = sample_package("remote").tar_zst();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/libfoo-1.0.tar.zst");
            then.status(200).body(bytes.clone());
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/missing.tar");
            then.status(404);
        })
        .await;

    let temp = tempfile::tempdir().unwrap();
    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();

    let ok = package_ref(
        "libfoo",
        &server.url("/libfoo-1.0.tar.zst"),
        blake3_of(&bytes),
        &temp.path().join("libfoo"),
    );
    assert!(coordinator.install(&ok).await.is_success());
    assert!(temp.path().join("libfoo/bin/tool").is_file());

    let gone = package_ref(
        "missing",
        &server.url("/missing.tar"),
        blake3_of(b""),
        &temp.path().join("missing"),
    );
    let result = coordinator.install(&gone).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::HttpStatus));
    assert_eq!(result.exit_code(), 11);
    missing.assert_hits_async(1).await;
    no_leftovers(temp.path(), temp.path());
}

#[tokio::test]
async fn remove_deletes_tree_and_record() {
    let temp = tempfile::tempdir().unwrap();
    let dest = temp.path().join("libfoo");
    let package = local_package(temp.path(), "libfoo", &sample_package("x").tar(), &dest);
    let coordinator = InstallCoordinator::new(test_config(temp.path())).unwrap();
    assert!(coordinator.install(&package).await.is_success());

    let removed = coordinator.remove("libfoo").await.unwrap();
    assert_eq!(removed.destination, dest);
    assert!(!dest.exists());
    assert!(coordinator.registry().unwrap().list().await.unwrap().is_empty());

    let err = coordinator.remove("libfoo").await.unwrap_err();
    assert!(err.to_string().contains("not installed"));
}

#[tokio::test]
async fn pool_returns_results_in_input_order() {
    let temp = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(InstallCoordinator::new(test_config(temp.path())).unwrap());
    let pool = InstallPool::new(coordinator, 2);

    let mut packages = Vec::new();
    for name in ["alpha", "beta", "gamma", "delta"] {
        let bytes = sample_package(name).tar();
        packages.push(local_package(
            temp.path(),
            name,
            &bytes,
            &temp.path().join("pkgs").join(name),
        ));
    }
    // One bad apple does not spoil the batch
    packages[2].expected_digest = blake3_of(b"wrong");

    let results = pool.install_all(packages).await;
    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma", "delta"]);
    assert!(results[0].is_success());
    assert!(results[1].is_success());
    assert_eq!(results[2].failure_kind(), Some(FailureKind::DigestMismatch));
    assert!(results[3].is_success());
    assert!(!temp.path().join("pkgs/gamma").exists());
}

#[tokio::test]
async fn cancelled_pool_touches_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(InstallCoordinator::new(test_config(temp.path())).unwrap());
    let pool = InstallPool::new(coordinator, 1);

    let packages: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|name| {
            let bytes = sample_package(name).tar();
            local_package(temp.path(), name, &bytes, &temp.path().join("pkgs").join(name))
        })
        .collect();

    pool.cancel();
    let results = pool.install_all(packages).await;
    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|r| r.status == InstallStatus::Cancelled));
    assert!(entries(&temp.path().join("pkgs")).is_empty());
}
