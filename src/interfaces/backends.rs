//! Composition of per-backend policy for one snap.
//!
//! A pass runs every backend independently. Within a backend, permanent
//! hooks run once per (snap, interface, side) and connected hooks once per
//! connection side owned by the target snap. A failing hook aborts only its
//! own backend; [`GenerationReport`] carries one result per backend and
//! [`GenerationReport::into_result`] turns that into all-or-nothing.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::apparmor::{self, AppArmorPolicy};
use super::connection::{ConnectedPlug, ConnectedSlot, Connection};
use super::labels::LabelBuilder;
use super::mount::{self, MountProfile};
use super::policy::Sanitized;
use super::registry::Registry;
use super::{Interface, InterfaceError, Specification};
use crate::release::ExecutionEnvironment;
use crate::snap::{Attributes, Endpoint, PlugInfo, SlotInfo, SnapInfo};

/// Enforcement backends generated by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Mandatory access control rules.
    AppArmor,
    /// Per-snap mount namespace entries.
    Mount,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppArmor => f.write_str("apparmor"),
            Self::Mount => f.write_str("mount"),
        }
    }
}

/// Which hook a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// Permanent plug hook.
    PermanentPlug,
    /// Permanent slot hook.
    PermanentSlot,
    /// Connected plug hook.
    ConnectedPlug,
    /// Connected slot hook.
    ConnectedSlot,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermanentPlug => f.write_str("permanent-plug"),
            Self::PermanentSlot => f.write_str("permanent-slot"),
            Self::ConnectedPlug => f.write_str("connected-plug"),
            Self::ConnectedSlot => f.write_str("connected-slot"),
        }
    }
}

/// A hook failed while generating one backend.
#[derive(Debug, Error)]
#[error("{backend} {hook} hook of interface {interface:?} failed for {endpoint}: {source}")]
pub struct GenerationError {
    /// Backend being generated.
    pub backend: Backend,
    /// Failing hook.
    pub hook: Hook,
    /// Capability type name.
    pub interface: String,
    /// `snap:name` of the endpoint the hook ran for.
    pub endpoint: String,
    /// Underlying fault.
    #[source]
    pub source: InterfaceError,
}

/// Per-backend results of one pass.
#[derive(Debug)]
pub struct GenerationReport {
    /// Target snap.
    pub snap: String,
    /// AppArmor backend result.
    pub apparmor: Result<AppArmorPolicy, GenerationError>,
    /// Mount backend result.
    pub mount: Result<MountProfile, GenerationError>,
}

impl GenerationReport {
    /// Whether every backend succeeded.
    pub fn is_complete(&self) -> bool {
        self.apparmor.is_ok() && self.mount.is_ok()
    }

    /// All backends, or the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first backend's [`GenerationError`].
    pub fn into_result(self) -> Result<GeneratedPolicy, GenerationError> {
        Ok(GeneratedPolicy {
            snap: self.snap,
            apparmor: self.apparmor?,
            mount: self.mount?,
        })
    }
}

/// Complete policy for one snap, ready for the enforcement loaders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedPolicy {
    /// Target snap.
    pub snap: String,
    /// AppArmor snippets by security tag.
    pub apparmor: AppArmorPolicy,
    /// Mount entries.
    pub mount: MountProfile,
}

/// Drives the hooks of every relevant interface for one snap.
#[derive(Debug, Clone, Copy)]
pub struct Composer<'r> {
    registry: &'r Registry,
    labels: LabelBuilder,
}

impl<'r> Composer<'r> {
    /// Composer over a frozen registry for the given environment.
    pub fn new(registry: &'r Registry, env: ExecutionEnvironment) -> Self {
        Self {
            registry,
            labels: LabelBuilder::new(env),
        }
    }

    /// Generate every backend for `snap`.
    ///
    /// `connections` should be the snap's active connections; any that do
    /// not involve it are skipped.
    ///
    /// # Panics
    ///
    /// Panics if a connection's interface is not in the registry, or if its
    /// endpoints disagree on the interface. Both mean the caller paired or
    /// sanitized endpoints against something other than this registry.
    pub fn compose(&self, snap: &Sanitized<SnapInfo>, connections: &[Connection]) -> GenerationReport {
        let apparmor = self.compose_backend::<apparmor::Specification>(snap, connections);
        let mount = self.compose_backend::<mount::Specification>(snap, connections);
        let report = GenerationReport {
            snap: snap.name.clone(),
            apparmor,
            mount,
        };
        info!(
            snap = %snap.name,
            connections = connections.len(),
            complete = report.is_complete(),
            "policy generation pass finished"
        );
        report
    }

    /// Generate a single backend for `snap`.
    ///
    /// # Errors
    ///
    /// Returns the first hook failure; the partially filled specification is
    /// discarded.
    ///
    /// # Panics
    ///
    /// See [`Composer::compose`].
    pub fn compose_backend<S: Specification>(
        &self,
        snap: &Sanitized<SnapInfo>,
        connections: &[Connection],
    ) -> Result<S::Output, GenerationError> {
        let mut spec = S::default();
        let result = self.fill(&mut spec, snap, connections);
        match result {
            Ok(()) => Ok(spec.finish()),
            Err(e) => {
                warn!(snap = %snap.name, backend = %S::BACKEND, error = %e, "backend generation failed");
                Err(e)
            }
        }
    }

    fn fill<S: Specification>(
        &self,
        spec: &mut S,
        snap: &SnapInfo,
        connections: &[Connection],
    ) -> Result<(), GenerationError> {
        for plug in merge_by_interface(snap.plugs.values()) {
            let iface = self.registry.expect(&plug.interface);
            debug!(backend = %S::BACKEND, interface = iface.name(), plug = %plug, "permanent plug hook");
            spec.add_permanent_plug(iface, &plug)
                .map_err(|e| failure::<S>(Hook::PermanentPlug, iface, plug.to_string(), e))?;
        }

        for slot in merge_by_interface(snap.slots.values()) {
            let iface = self.registry.expect(&slot.interface);
            debug!(backend = %S::BACKEND, interface = iface.name(), slot = %slot, "permanent slot hook");
            spec.add_permanent_slot(iface, &slot)
                .map_err(|e| failure::<S>(Hook::PermanentSlot, iface, slot.to_string(), e))?;
        }

        for conn in connections {
            if !conn.involves(&snap.name) {
                debug!(snap = %snap.name, connection = %conn.conn_ref(), "connection does not involve snap, skipped");
                continue;
            }
            let iface = self.resolve(conn);
            let plug_label = self
                .labels
                .plug_expr(conn.plug())
                .map_err(|e| failure::<S>(Hook::ConnectedPlug, iface, conn.plug().to_string(), e.into()))?;
            let slot_label = self
                .labels
                .slot_expr(conn.slot())
                .map_err(|e| failure::<S>(Hook::ConnectedSlot, iface, conn.slot().to_string(), e.into()))?;
            let plug = ConnectedPlug::new(conn.plug(), conn.plug_attrs(), plug_label);
            let slot = ConnectedSlot::new(conn.slot(), conn.slot_attrs(), slot_label);

            if conn.slot().snap == snap.name {
                debug!(backend = %S::BACKEND, connection = %conn.conn_ref(), "connected slot hook");
                spec.add_connected_slot(iface, &plug, &slot)
                    .map_err(|e| failure::<S>(Hook::ConnectedSlot, iface, conn.slot().to_string(), e))?;
            }
            if conn.plug().snap == snap.name {
                debug!(backend = %S::BACKEND, connection = %conn.conn_ref(), "connected plug hook");
                spec.add_connected_plug(iface, &plug, &slot)
                    .map_err(|e| failure::<S>(Hook::ConnectedPlug, iface, conn.plug().to_string(), e))?;
            }
        }
        Ok(())
    }

    /// Interface for a connection, checking both endpoints agree with it.
    fn resolve(&self, conn: &Connection) -> &'r dyn Interface {
        let iface = self.registry.expect(conn.interface());
        assert_connection_interface(iface, conn);
        iface
    }
}

/// Abort unless both endpoints of `conn` belong to `iface`.
///
/// # Panics
///
/// Panics when the plug or slot declares a different interface.
pub fn assert_connection_interface(iface: &dyn Interface, conn: &Connection) {
    if conn.plug().interface != iface.name() || conn.slot().interface != iface.name() {
        panic!(
            "connection {} ({:?} -> {:?}) routed to interface {:?}",
            conn.conn_ref(),
            conn.plug().interface,
            conn.slot().interface,
            iface.name()
        );
    }
}

fn failure<S: Specification>(
    hook: Hook,
    iface: &dyn Interface,
    endpoint: String,
    source: InterfaceError,
) -> GenerationError {
    GenerationError {
        backend: S::BACKEND,
        hook,
        interface: iface.name().to_owned(),
        endpoint,
        source,
    }
}

/// Endpoint kinds that can be merged for permanent hooks.
trait Mergeable: Endpoint + Clone {
    fn apps_mut(&mut self) -> &mut Vec<String>;
    fn attrs_mut(&mut self) -> &mut Attributes;
}

impl Mergeable for PlugInfo {
    fn apps_mut(&mut self) -> &mut Vec<String> {
        &mut self.apps
    }

    fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }
}

impl Mergeable for SlotInfo {
    fn apps_mut(&mut self) -> &mut Vec<String> {
        &mut self.apps
    }

    fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }
}

/// One representative endpoint per interface, bound to the union of the
/// apps of every endpoint of that interface.
///
/// Permanent hooks then run once per snap and interface no matter how many
/// endpoints of that interface the snap declares. The representative keeps
/// the first endpoint's name; its attributes are the union of all of them,
/// the first declaration winning when two endpoints set the same key.
fn merge_by_interface<'a, T: Mergeable + 'a>(endpoints: impl Iterator<Item = &'a T>) -> Vec<T> {
    let mut merged: Vec<T> = Vec::new();
    for endpoint in endpoints {
        match merged.iter_mut().find(|m| m.interface() == endpoint.interface()) {
            Some(existing) => {
                let apps = existing.apps_mut();
                for app in endpoint.apps() {
                    if !apps.contains(app) {
                        apps.push(app.clone());
                    }
                }
                apps.sort();
                let attrs = existing.attrs_mut();
                for (key, value) in endpoint.attrs() {
                    attrs.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            None => merged.push(endpoint.clone()),
        }
    }
    merged
}
