//! Tests for `src/interfaces/policy.rs`: install-time auto-connect.

use plugboard::interfaces::builtin_registry;
use plugboard::interfaces::policy::{auto_connections, evaluate_auto_connect};
use plugboard::release::ExecutionEnvironment;

use crate::fixtures::{client, core, portal, snap};

#[test]
fn only_matching_interfaces_are_paired() {
    let plugs = client().plugs();
    let slots = portal().slots();

    let decisions = evaluate_auto_connect(
        builtin_registry(),
        ExecutionEnvironment::AllSnap,
        &plugs,
        &slots,
    );

    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].plug.interface, "portal-access");
    assert!(decisions[0].auto_connect);
}

#[test]
fn decisions_are_deterministic() {
    let plugs = client().plugs();
    let mut slots = portal().slots();
    slots.extend(core().slots());

    for env in [ExecutionEnvironment::AllSnap, ExecutionEnvironment::Classic] {
        let first: Vec<_> = evaluate_auto_connect(builtin_registry(), env, &plugs, &slots)
            .iter()
            .map(|d| (d.plug.name.clone(), d.slot.snap.clone(), d.auto_connect))
            .collect();
        let second: Vec<_> = evaluate_auto_connect(builtin_registry(), env, &plugs, &slots)
            .iter()
            .map(|d| (d.plug.name.clone(), d.slot.snap.clone(), d.auto_connect))
            .collect();
        assert_eq!(first, second);
    }
}

#[test]
fn notifications_only_auto_connect_to_the_platform() {
    let plugs = client().plugs();
    let daemon = snap(
        r#"
name = "notifyd"
[apps.daemon]
slots = ["desktop-notifications"]
"#,
    );
    let mut slots = daemon.slots();
    slots.extend(core().slots());

    let connections = auto_connections(
        builtin_registry(),
        ExecutionEnvironment::Classic,
        &plugs,
        &slots,
    );

    let notify: Vec<_> = connections
        .iter()
        .filter(|c| c.interface() == "desktop-notifications")
        .map(|c| c.slot().snap.clone())
        .collect();
    assert_eq!(notify, vec!["core".to_owned()]);
}

#[test]
fn approved_pairs_become_connections() {
    let plugs = client().plugs();
    let slots = portal().slots();

    let connections = auto_connections(
        builtin_registry(),
        ExecutionEnvironment::AllSnap,
        &plugs,
        &slots,
    );

    assert_eq!(connections.len(), 1);
    assert_eq!(
        connections[0].conn_ref().to_string(),
        "client:portal-access xdg-desktop-portal:portal-access"
    );
}
