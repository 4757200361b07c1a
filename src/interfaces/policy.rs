//! Sanitization gating and auto-connect evaluation.
//!
//! An endpoint only becomes connectable once its capability type accepted
//! the declaration, which is captured by the [`Sanitized`] wrapper.
//! Whether a pair may be joined without operator consent is left entirely to
//! the capability type's own `auto_connect` predicate.

use std::ops::Deref;

use tracing::debug;

use super::connection::Connection;
use super::registry::Registry;
use crate::release::ExecutionEnvironment;
use crate::snap::{PlugInfo, SlotInfo, SnapInfo};

/// An endpoint whose declaration passed its capability type's sanitizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized<T>(T);

impl<T> Sanitized<T> {
    pub(crate) fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Unwrap the endpoint.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl Sanitized<SnapInfo> {
    /// One of the snap's plugs, already sanitized with the snap.
    pub fn plug(&self, name: &str) -> Option<Sanitized<PlugInfo>> {
        self.0.plugs.get(name).cloned().map(Sanitized)
    }

    /// One of the snap's slots, already sanitized with the snap.
    pub fn slot(&self, name: &str) -> Option<Sanitized<SlotInfo>> {
        self.0.slots.get(name).cloned().map(Sanitized)
    }

    /// Every plug of the snap.
    pub fn plugs(&self) -> Vec<Sanitized<PlugInfo>> {
        self.0.plugs.values().cloned().map(Sanitized).collect()
    }

    /// Every slot of the snap.
    pub fn slots(&self) -> Vec<Sanitized<SlotInfo>> {
        self.0.slots.values().cloned().map(Sanitized).collect()
    }
}

impl<T> Deref for Sanitized<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

/// Outcome of evaluating one candidate pair at install time.
#[derive(Debug, Clone)]
pub struct AutoConnectDecision<'a> {
    /// The candidate plug.
    pub plug: &'a Sanitized<PlugInfo>,
    /// The candidate slot.
    pub slot: &'a Sanitized<SlotInfo>,
    /// Whether the pair may be connected without consent.
    pub auto_connect: bool,
}

impl AutoConnectDecision<'_> {
    /// Build the connection for an approved pair.
    pub fn connection(&self) -> Option<Connection> {
        self.auto_connect.then(|| Connection::new(self.plug, self.slot))
    }
}

/// Evaluate every plug/slot pair of matching interface exactly once.
///
/// Pairs of different interfaces are never considered. Results follow the
/// order of `plugs`, then `slots`.
///
/// # Panics
///
/// Panics if a sanitized endpoint's interface is missing from `registry`,
/// meaning it was sanitized against a different registry.
pub fn evaluate_auto_connect<'a>(
    registry: &Registry,
    env: ExecutionEnvironment,
    plugs: &'a [Sanitized<PlugInfo>],
    slots: &'a [Sanitized<SlotInfo>],
) -> Vec<AutoConnectDecision<'a>> {
    let mut decisions = Vec::new();
    for plug in plugs {
        let iface = registry.expect(&plug.interface);
        for slot in slots.iter().filter(|s| s.interface == plug.interface) {
            let auto_connect = iface.auto_connect(plug, slot, env);
            debug!(
                interface = iface.name(),
                plug = %**plug,
                slot = %**slot,
                auto_connect,
                "auto-connect evaluated"
            );
            decisions.push(AutoConnectDecision {
                plug,
                slot,
                auto_connect,
            });
        }
    }
    decisions
}

/// Connections that may be created at install time without consent.
///
/// # Panics
///
/// See [`evaluate_auto_connect`].
pub fn auto_connections(
    registry: &Registry,
    env: ExecutionEnvironment,
    plugs: &[Sanitized<PlugInfo>],
    slots: &[Sanitized<SlotInfo>],
) -> Vec<Connection> {
    evaluate_auto_connect(registry, env, plugs, slots)
        .iter()
        .filter_map(AutoConnectDecision::connection)
        .collect()
}
