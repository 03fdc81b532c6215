//! End-to-end tests driving the `yama` binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use yama_hash::{Hash, HashAlgorithm};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!(
            "[general]\ncolor = \"never\"\n\n[paths]\nstaging_dir = {:?}\nstate_dir = {:?}\n\n[network]\nretries = 0\ninitial_delay_ms = 1\n",
            dir.path().join("staging").display().to_string(),
            dir.path().join("state").display().to_string(),
        );
        std::fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn yama(&self, args: &[&str]) -> Output {
        let config = self.path().join("config.toml");
        Command::new(env!("CARGO_BIN_EXE_yama"))
            .arg("--config")
            .arg(&config)
            .args(args)
            .env_remove("RUST_LOG")
            .env_remove("YAMA_OUTPUT")
            .env_remove("YAMA_STAGING_DIR")
            .output()
            .unwrap()
    }

    /// Write a small tar archive and return its file URL and blake3 digest
    fn archive(&self, name: &str, marker: &str) -> (String, String) {
        let path = self.path().join(format!("{name}.tar"));
        let mut builder = tar::Builder::new(Vec::new());

        let mut dir = tar::Header::new_ustar();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_mode(0o755);
        dir.set_size(0);
        builder.append_data(&mut dir, "bin", std::io::empty()).unwrap();

        let body = format!("#!/bin/sh\necho {marker}\n");
        let mut file = tar::Header::new_ustar();
        file.set_mode(0o755);
        file.set_size(body.len() as u64);
        builder
            .append_data(&mut file, format!("bin/{name}"), body.as_bytes())
            .unwrap();

        let bytes = builder.into_inner().unwrap();
        std::fs::write(&path, &bytes).unwrap();
        let digest = Hash::from_data(HashAlgorithm::Blake3, &bytes).to_string();
        (format!("file://{}", path.display()), digest)
    }

    fn dest(&self, name: &str) -> PathBuf {
        self.path().join("opt").join(name)
    }
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn prints_version_and_help() {
    let version = Command::new(env!("CARGO_BIN_EXE_yama"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(version.status.success());
    assert!(String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")));

    let help = Command::new(env!("CARGO_BIN_EXE_yama"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(help.status.success());
    let text = String::from_utf8_lossy(&help.stdout);
    for command in ["install", "batch", "list", "info", "remove"] {
        assert!(text.contains(command), "help is missing {command}");
    }
}

#[test]
fn install_list_info_remove() {
    let ws = Workspace::new();
    let (url, digest) = ws.archive("hello", "v1");
    let dest = ws.dest("hello");
    let dest_arg = dest.display().to_string();

    let install = ws.yama(&[
        "--json", "install", "hello", "--url", &url, "--digest", &digest, "--dest", &dest_arg,
    ]);
    assert_eq!(install.status.code(), Some(0), "{install:?}");
    let json = stdout_json(&install);
    assert_eq!(json["kind"], "installs");
    assert_eq!(json["data"][0]["status"]["status"], "success");
    assert_eq!(
        std::fs::read_to_string(dest.join("bin/hello")).unwrap(),
        "#!/bin/sh\necho v1\n"
    );

    let list = ws.yama(&["--json", "list"]);
    assert_eq!(list.status.code(), Some(0));
    let json = stdout_json(&list);
    assert_eq!(json["data"][0]["name"], "hello");
    assert_eq!(json["data"][0]["digest"], digest.as_str());

    let info = ws.yama(&["--json", "info", "hello"]);
    assert_eq!(info.status.code(), Some(0));
    assert_eq!(stdout_json(&info)["kind"], "package");

    let remove = ws.yama(&["rm", "hello"]);
    assert_eq!(remove.status.code(), Some(0), "{remove:?}");
    assert!(!dest.exists());

    let missing = ws.yama(&["info", "hello"]);
    assert_ne!(missing.status.code(), Some(0));
}

#[test]
fn digest_mismatch_exits_with_verification_code() {
    let ws = Workspace::new();
    let (url, _) = ws.archive("hello", "v1");
    let wrong = Hash::from_data(HashAlgorithm::Blake3, b"something else").to_string();
    let dest = ws.dest("hello");

    let output = ws.yama(&[
        "install",
        "hello",
        "--url",
        &url,
        "--digest",
        &wrong,
        "--dest",
        &dest.display().to_string(),
    ]);
    assert_eq!(output.status.code(), Some(20));
    assert!(!dest.exists());
}

#[test]
fn malformed_digest_is_a_usage_error() {
    let ws = Workspace::new();
    let (url, _) = ws.archive("hello", "v1");

    let output = ws.yama(&[
        "install",
        "hello",
        "--url",
        &url,
        "--digest",
        "blake3:not-hex",
        "--dest",
        &ws.dest("hello").display().to_string(),
    ]);
    assert_eq!(output.status.code(), Some(78));
}

#[test]
fn batch_reports_every_package_in_order() {
    let ws = Workspace::new();
    let (good_url, good_digest) = ws.archive("good", "ok");
    let (bad_url, _) = ws.archive("bad", "tampered");
    let bad_digest = Hash::from_data(HashAlgorithm::Blake3, b"expected").to_string();

    let batch = format!(
        r#"
[[package]]
name = "good"
url = "{good_url}"
digest = "{good_digest}"
dest = "opt/good"

[[package]]
name = "bad"
url = "{bad_url}"
digest = "{bad_digest}"
dest = "opt/bad"
"#
    );
    let batch_path = ws.path().join("batch.toml");
    std::fs::write(&batch_path, batch).unwrap();

    let output = ws.yama(&["--json", "-j", "2", "batch", &batch_path.display().to_string()]);
    assert_eq!(output.status.code(), Some(20));

    let json = stdout_json(&output);
    let results = json["data"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "good");
    assert_eq!(results[0]["status"]["status"], "success");
    assert_eq!(results[1]["name"], "bad");
    assert_eq!(results[1]["status"]["status"], "failed");
    assert_eq!(results[1]["status"]["kind"], "digest_mismatch");

    assert!(ws.dest("good").join("bin/good").is_file());
    assert!(!ws.dest("bad").exists());
}

#[test]
fn invalid_config_exits_with_config_code() {
    let ws = Workspace::new();
    std::fs::write(ws.path().join("config.toml"), "[install]\nextract_timeout = 0\n").unwrap();

    let output = ws.yama(&["list"]);
    assert_eq!(output.status.code(), Some(78));
}
