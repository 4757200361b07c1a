//! Tests for `src/interfaces/builtin/portal_access.rs`.

use plugboard::interfaces::builtin::PortalAccess;
use plugboard::interfaces::{
    apparmor, builtin_registry, mount, Composer, ConnectedPlug, ConnectedSlot, LabelBuilder,
    Specification,
};
use plugboard::release::ExecutionEnvironment;

use crate::fixtures::{client, connect, core, other_client, portal, snap};

#[test]
fn connected_slot_names_the_client_as_peer() {
    let client = client();
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let labels = LabelBuilder::new(ExecutionEnvironment::AllSnap);
    let plug = ConnectedPlug::new(
        conn.plug(),
        conn.plug_attrs(),
        labels.plug_expr(conn.plug()).expect("plug label"),
    );
    let slot = ConnectedSlot::new(
        conn.slot(),
        conn.slot_attrs(),
        labels.slot_expr(conn.slot()).expect("slot label"),
    );

    let mut spec = apparmor::Specification::new();
    spec.add_connected_slot(&PortalAccess, &plug, &slot)
        .expect("connected slot hook");
    let policy = spec.finish();

    assert_eq!(policy.security_tags(), vec!["snap.xdg-desktop-portal.app"]);
    let snippets = policy.snippets_for_tag("snap.xdg-desktop-portal.app");
    assert_eq!(snippets.len(), 1);
    assert!(snippets[0].contains("peer=(label=snap.client.app)"));
}

#[test]
fn slot_pass_holds_one_connected_snippet_per_peer() {
    let client = client();
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<apparmor::Specification>(&portal, &[conn])
        .expect("apparmor generation");

    assert_eq!(policy.security_tags(), vec!["snap.xdg-desktop-portal.app"]);
    let snippets = policy.snippets_for_tag("snap.xdg-desktop-portal.app");
    let with_peer = snippets
        .iter()
        .filter(|s| s.contains("peer=(label=snap.client.app)"))
        .count();
    assert_eq!(with_peer, 1);
}

#[test]
fn platform_slot_on_classic_is_unconfined_peer() {
    let client = client();
    let core = core();
    let conn = connect(&client, "portal-access", &core, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::Classic)
        .compose_backend::<apparmor::Specification>(&client, &[conn])
        .expect("apparmor generation");

    let text = policy.snippet_for_tag("snap.client.app");
    assert!(text.contains("peer=(label=unconfined)"));
    assert!(!text.contains("snap.core"));
    assert!(text.contains("owner /run/user/[0-9]*/doc/** rw,"));
}

#[test]
fn app_slot_on_classic_keeps_provider_label() {
    let client = client();
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::Classic)
        .compose_backend::<apparmor::Specification>(&client, &[conn])
        .expect("apparmor generation");

    let text = policy.snippet_for_tag("snap.client.app");
    assert!(text.contains("peer=(label=snap.xdg-desktop-portal.app)"));
    assert!(!text.contains("unconfined)"));
}

#[test]
fn platform_slot_on_all_snap_keeps_its_namespace() {
    let client = client();
    let core = core();
    let conn = connect(&client, "portal-access", &core, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<apparmor::Specification>(&client, &[conn])
        .expect("apparmor generation");

    let text = policy.snippet_for_tag("snap.client.app");
    assert!(text.contains("peer=(label=snap.core.*)"));
    assert!(!text.contains("unconfined)"));
}

#[test]
fn permanent_slot_snippet_once_for_many_plugs() {
    let portal = portal();
    let client = client();
    let viewer = other_client();
    let connections = [
        connect(&client, "portal-access", &portal, "portal-access"),
        connect(&viewer, "portal-access", &portal, "portal-access"),
    ];

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<apparmor::Specification>(&portal, &connections)
        .expect("apparmor generation");

    assert_eq!(policy.security_tags(), vec!["snap.xdg-desktop-portal.app"]);
    let snippets = policy.snippets_for_tag("snap.xdg-desktop-portal.app");
    let permanent = snippets.iter().filter(|s| s.contains("dbus (bind)")).count();
    assert_eq!(permanent, 1);
    assert!(snippets.iter().any(|s| s.contains("peer=(label=snap.client.app)")));
    assert!(snippets.iter().any(|s| s.contains("peer=(label=snap.viewer.view)")));
}

#[test]
fn permanent_slot_snippet_once_for_many_slots() {
    let portal = snap(
        r#"
name = "portals"
[apps.desktop]
[apps.documents]
[slots.one]
interface = "portal-access"
[slots.two]
interface = "portal-access"
[slots.three]
interface = "portal-access"
"#,
    );

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<apparmor::Specification>(&portal, &[])
        .expect("apparmor generation");

    assert_eq!(
        policy.security_tags(),
        vec!["snap.portals.desktop", "snap.portals.documents"]
    );
    for tag in policy.security_tags() {
        assert_eq!(policy.snippets_for_tag(tag).len(), 1);
    }
}

#[test]
fn document_portal_bind_mount() {
    let client = client();
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let profile = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<mount::Specification>(&client, &[conn.clone(), conn])
        .expect("mount generation");

    assert_eq!(profile.entries().len(), 1);
    let entry = &profile.entries()[0];
    assert_eq!(entry.name, "/run/user/1000/doc/by-app/snap.pkg.client");
    assert_eq!(entry.dir, "/run/user/1000/doc");
    assert_eq!(entry.options, vec!["bind", "rw"]);
    assert_eq!(
        profile.fstab(),
        "/run/user/1000/doc/by-app/snap.pkg.client /run/user/1000/doc none bind,rw 0 0\n"
    );
}

#[test]
fn slot_side_gets_no_mount_entries() {
    let client = client();
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let profile = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<mount::Specification>(&portal, &[conn])
        .expect("mount generation");

    assert!(profile.is_empty());
}

#[test]
fn multi_app_plug_uses_bounded_alternation() {
    let client = snap(
        r#"
name = "editor"
[apps.main]
[apps.helper]
[plugs.portal-access]
"#,
    );
    let portal = portal();
    let conn = connect(&client, "portal-access", &portal, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose_backend::<apparmor::Specification>(&portal, &[conn])
        .expect("apparmor generation");

    let text = policy.snippet_for_tag("snap.xdg-desktop-portal.app");
    assert!(text.contains("peer=(label=snap.editor.{helper,main})"));
    assert!(!text.contains("snap.editor.*"));
}
