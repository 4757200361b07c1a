//! Tests for `src/interfaces/backends.rs`: whole generation passes.

use plugboard::interfaces::{builtin_registry, Backend, Composer, Hook, InterfaceError};
use plugboard::release::ExecutionEnvironment;

use crate::fixtures::{attrs, client, connect, core, other_client, portal};

#[test]
fn repeated_passes_are_byte_identical() {
    let client = client();
    let portal = portal();
    let core = core();
    let connections = [
        connect(&client, "portal-access", &portal, "portal-access"),
        connect(&client, "desktop-notifications", &core, "desktop-notifications"),
    ];
    let composer = Composer::new(builtin_registry(), ExecutionEnvironment::Classic);

    let first = composer
        .compose(&client, &connections)
        .into_result()
        .expect("first pass");
    let second = composer
        .compose(&client, &connections)
        .into_result()
        .expect("second pass");

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).expect("serialize"),
        serde_json::to_string(&second).expect("serialize")
    );
}

#[test]
fn no_placeholder_survives_generation() {
    let client = client();
    let portal = portal();
    let core = core();
    let connections = [
        connect(&client, "portal-access", &portal, "portal-access"),
        connect(&client, "desktop-notifications", &core, "desktop-notifications"),
    ];

    for env in [ExecutionEnvironment::AllSnap, ExecutionEnvironment::Classic] {
        let composer = Composer::new(builtin_registry(), env);
        for snap in [&client, &portal] {
            let policy = composer
                .compose(snap, &connections)
                .into_result()
                .expect("generation");
            for tag in policy.apparmor.security_tags() {
                for snippet in policy.apparmor.snippets_for_tag(tag) {
                    assert!(!snippet.contains("###"), "unresolved placeholder under {tag}");
                }
            }
        }
    }
}

#[test]
fn connections_of_other_snaps_are_ignored() {
    let client = client();
    let viewer = other_client();
    let portal = portal();
    let unrelated = connect(&viewer, "portal-access", &portal, "portal-access");

    let policy = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose(&client, &[unrelated])
        .into_result()
        .expect("generation");

    assert!(policy.apparmor.is_empty());
    assert!(policy.mount.is_empty());
}

#[test]
fn failing_backend_does_not_spoil_the_others() {
    let client = client();
    let portal = portal();
    let core = core();
    let connections = [
        connect(&client, "portal-access", &portal, "portal-access"),
        connect(&client, "desktop-notifications", &core, "desktop-notifications")
            .with_dynamic_attrs(attrs("desktop-entry", "../escape"), Default::default()),
    ];

    let report = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap)
        .compose(&client, &connections);

    assert!(!report.is_complete());
    let mount = report.mount.as_ref().expect("mount backend should succeed");
    assert_eq!(mount.entries().len(), 1);

    let err = report.apparmor.as_ref().expect_err("apparmor backend should fail");
    assert_eq!(err.backend, Backend::AppArmor);
    assert_eq!(err.hook, Hook::ConnectedPlug);
    assert_eq!(err.interface, "desktop-notifications");
    assert_eq!(err.endpoint, "client:desktop-notifications");
    assert!(matches!(
        &err.source,
        InterfaceError::Attribute { attribute, .. } if attribute == "desktop-entry"
    ));

    let err = report.into_result().expect_err("operation is all-or-nothing");
    assert_eq!(err.backend, Backend::AppArmor);
}

#[test]
fn concurrent_passes_share_the_registry() {
    let client = client();
    let portal = portal();
    let connections = [connect(&client, "portal-access", &portal, "portal-access")];
    let composer = Composer::new(builtin_registry(), ExecutionEnvironment::AllSnap);

    let expected = composer
        .compose(&portal, &connections)
        .into_result()
        .expect("generation");

    std::thread::scope(|s| {
        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(s.spawn(|| {
                composer
                    .compose(&portal, &connections)
                    .into_result()
                    .expect("generation")
            }));
        }
        for handle in handles {
            let policy = handle.join().expect("thread should not panic");
            assert_eq!(policy, expected);
        }
    });
}
