//! CLI contract tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;

const SCENARIO: &str = r#"
[[snaps]]
name = "client"
[snaps.apps.app]
plugs = ["portal-access"]

[[snaps]]
name = "xdg-desktop-portal"
[snaps.apps.app]
slots = ["portal-access"]

[[connections]]
plug = "client:portal-access"
slot = "xdg-desktop-portal:portal-access"
"#;

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("scenario.toml");
    std::fs::write(&path, SCENARIO).expect("write scenario");
    (dir, path)
}

fn plugboard(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("plugboard").expect("binary should build");
    cmd.env("PLUGBOARD_CONFIG_PATH", dir.join("absent.toml"))
        .env("RUST_LOG", "off")
        .args(["--environment", "all-snap"]);
    cmd
}

#[test]
fn generate_prints_rules_and_mounts() {
    let (dir, path) = setup();
    let output = plugboard(dir.path())
        .arg("generate")
        .arg(&path)
        .args(["--snap", "client"])
        .output()
        .expect("run plugboard");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.contains("# apparmor: snap.client.app"));
    assert!(stdout.contains("peer=(label=snap.xdg-desktop-portal.app)"));
    assert!(stdout.contains(
        "/run/user/1000/doc/by-app/snap.pkg.client /run/user/1000/doc none bind,rw 0 0"
    ));
}

#[test]
fn generate_json_is_machine_readable() {
    let (dir, path) = setup();
    let output = plugboard(dir.path())
        .arg("generate")
        .arg(&path)
        .args(["--snap", "xdg-desktop-portal", "--json"])
        .output()
        .expect("run plugboard");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["snap"], "xdg-desktop-portal");
    let snippets = value["apparmor"]["snippets"]["snap.xdg-desktop-portal.app"]
        .as_array()
        .expect("snippets for the portal tag");
    assert_eq!(snippets.len(), 2);
    assert_eq!(value["mount"]["entries"], serde_json::json!([]));
}

#[test]
fn check_reports_auto_connect_decisions() {
    let (dir, path) = setup();
    let output = plugboard(dir.path())
        .arg("check")
        .arg(&path)
        .output()
        .expect("run plugboard");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf-8 output");
    assert!(stdout.contains("environment: all-snap"));
    assert!(stdout.contains(
        "client:portal-access -> xdg-desktop-portal:portal-access [portal-access]: auto-connect"
    ));
}

#[test]
fn unknown_snap_fails() {
    let (dir, path) = setup();
    let output = plugboard(dir.path())
        .arg("generate")
        .arg(&path)
        .args(["--snap", "ghost"])
        .output()
        .expect("run plugboard");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf-8 output");
    assert!(stderr.contains("unknown snap \"ghost\""));
}
