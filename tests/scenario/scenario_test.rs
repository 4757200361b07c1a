//! Tests for `src/scenario.rs`: loading scenario files and running passes.

use std::path::PathBuf;

use plugboard::interfaces::builtin_registry;
use plugboard::release::ExecutionEnvironment;
use plugboard::scenario::{Scenario, ScenarioError};

const DESKTOP: &str = r#"
[[snaps]]
name = "core"
type = "os"
[snaps.slots.portal-access]
[snaps.slots.desktop-notifications]

[[snaps]]
name = "client"
[snaps.apps.app]
command = "bin/client"
plugs = ["portal-access", "desktop-notifications"]

[[connections]]
plug = "client:portal-access"
slot = "core:portal-access"

[[connections]]
plug = "client:desktop-notifications"
slot = "core:desktop-notifications"
[connections.plug-attrs]
desktop-entry = "org.example.Client"
"#;

fn write_scenario(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("scenario.toml");
    std::fs::write(&path, contents).expect("write scenario");
    path
}

#[test]
fn load_from_file_and_generate() {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = write_scenario(&dir, DESKTOP);
    let registry = builtin_registry();

    let scenario = Scenario::load(&path, registry).expect("scenario should load");
    assert_eq!(scenario.connections().len(), 2);
    assert_eq!(scenario.connections_for("client").len(), 2);

    let policy = scenario
        .generate(registry, ExecutionEnvironment::Classic, "client")
        .expect("snap exists")
        .into_result()
        .expect("generation");

    assert_eq!(policy.snap, "client");
    assert_eq!(policy.apparmor.security_tags(), vec!["snap.client.app"]);
    assert_eq!(policy.apparmor.snippets_for_tag("snap.client.app").len(), 2);
    assert_eq!(policy.mount.entries().len(), 1);
}

#[test]
fn dynamic_attributes_reach_the_connection() {
    let scenario = Scenario::parse(DESKTOP, builtin_registry()).expect("scenario should load");
    let notify = scenario
        .connections()
        .iter()
        .find(|c| c.interface() == "desktop-notifications")
        .expect("notification connection");
    assert_eq!(
        notify
            .plug_attrs()
            .get("desktop-entry")
            .and_then(|v| v.as_str()),
        Some("org.example.Client")
    );
}

#[test]
fn install_connections_follow_interface_policy() {
    let doc = r#"
[[snaps]]
name = "core"
type = "os"
[snaps.slots.portal-access]

[[snaps]]
name = "notifyd"
[snaps.apps.daemon]
slots = ["desktop-notifications"]

[[snaps]]
name = "client"
[snaps.apps.app]
plugs = ["portal-access", "desktop-notifications"]
"#;
    let registry = builtin_registry();
    let scenario = Scenario::parse(doc, registry).expect("scenario should load");

    let connections = scenario
        .install_connections(registry, ExecutionEnvironment::AllSnap, "client")
        .expect("snap exists");

    let refs: Vec<String> = connections.iter().map(|c| c.conn_ref().to_string()).collect();
    assert_eq!(refs, vec!["client:portal-access core:portal-access".to_owned()]);
}

#[test]
fn generating_unknown_snap_is_an_error() {
    let registry = builtin_registry();
    let scenario = Scenario::parse(DESKTOP, registry).expect("scenario should load");
    let err = scenario
        .generate(registry, ExecutionEnvironment::AllSnap, "ghost")
        .expect_err("unknown snap");
    assert!(matches!(err, ScenarioError::UnknownSnap(name) if name == "ghost"));
}

#[test]
fn mismatched_connection_is_reported_not_fatal() {
    let doc = DESKTOP.replace("slot = \"core:portal-access\"", "slot = \"core:desktop-notifications\"");
    let err = Scenario::parse(&doc, builtin_registry()).expect_err("mismatch");
    assert!(matches!(err, ScenarioError::InterfaceMismatch { .. }));
}

#[test]
fn malformed_desktop_entry_blocks_loading() {
    let doc = DESKTOP.replace(
        "plugs = [\"portal-access\", \"desktop-notifications\"]",
        "plugs = [\"portal-access\", \"notify\"]\n[snaps.plugs.notify]\ninterface = \"desktop-notifications\"\ndesktop-entry = \".hidden\"",
    );
    let err = Scenario::parse(&doc, builtin_registry()).expect_err("sanitization");
    assert!(matches!(err, ScenarioError::Sanitize(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = Scenario::load(&PathBuf::from("/nonexistent/scenario.toml"), builtin_registry())
        .expect_err("missing file");
    assert!(matches!(err, ScenarioError::Io { .. }));
}
