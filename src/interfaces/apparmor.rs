//! AppArmor rule backend.
//!
//! Snippets are grouped by security tag. Hooks call [`Specification::add_snippet`]
//! and the snippet lands under every tag of the endpoint the hook runs for.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::backends::Backend;
use super::connection::{ConnectedPlug, ConnectedSlot};
use super::{
    assert_connected_interface, assert_plug_interface, assert_slot_interface, Interface,
    InterfaceError,
};
use crate::snap::{Endpoint, PlugInfo, SlotInfo};

/// Accumulates AppArmor snippets during one generation pass.
#[derive(Debug, Default)]
pub struct Specification {
    snippets: IndexMap<String, Vec<String>>,
    scope: Vec<String>,
}

impl Specification {
    /// Empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snippet for every security tag in the current hook scope.
    pub fn add_snippet(&mut self, snippet: impl AsRef<str>) {
        let scope = std::mem::take(&mut self.scope);
        for tag in &scope {
            self.add_snippet_for(tag, snippet.as_ref());
        }
        self.scope = scope;
    }

    /// Add a snippet for one explicit security tag.
    ///
    /// Adding identical text twice for the same tag keeps one copy.
    pub fn add_snippet_for(&mut self, tag: &str, snippet: &str) {
        let entry = self.snippets.entry(tag.to_owned()).or_default();
        if entry.iter().any(|s| s == snippet) {
            trace!(tag, "duplicate snippet ignored");
            return;
        }
        entry.push(snippet.to_owned());
    }

    /// Tags that received snippets so far, in first-seen order.
    pub fn security_tags(&self) -> Vec<&str> {
        self.snippets.keys().map(String::as_str).collect()
    }

    fn scoped<F>(&mut self, tags: Vec<String>, f: F) -> Result<(), InterfaceError>
    where
        F: FnOnce(&mut Self) -> Result<(), InterfaceError>,
    {
        let previous = std::mem::replace(&mut self.scope, tags);
        let result = f(self);
        self.scope = previous;
        result
    }
}

impl super::Specification for Specification {
    type Output = AppArmorPolicy;

    const BACKEND: Backend = Backend::AppArmor;

    fn add_permanent_plug(&mut self, iface: &dyn Interface, plug: &PlugInfo) -> Result<(), InterfaceError> {
        assert_plug_interface(iface.name(), plug);
        self.scoped(plug.security_tags(), |spec| {
            iface.apparmor_permanent_plug(spec, plug)
        })
    }

    fn add_permanent_slot(&mut self, iface: &dyn Interface, slot: &SlotInfo) -> Result<(), InterfaceError> {
        assert_slot_interface(iface.name(), slot);
        self.scoped(slot.security_tags(), |spec| {
            iface.apparmor_permanent_slot(spec, slot)
        })
    }

    fn add_connected_plug(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        assert_connected_interface(iface.name(), plug, slot);
        self.scoped(plug.info().security_tags(), |spec| {
            iface.apparmor_connected_plug(spec, plug, slot)
        })
    }

    fn add_connected_slot(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        assert_connected_interface(iface.name(), plug, slot);
        self.scoped(slot.info().security_tags(), |spec| {
            iface.apparmor_connected_slot(spec, plug, slot)
        })
    }

    fn finish(self) -> AppArmorPolicy {
        AppArmorPolicy {
            snippets: self
                .snippets
                .into_iter()
                .filter(|(_, snippets)| !snippets.is_empty())
                .collect(),
        }
    }
}

/// Finished, read-only AppArmor output of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppArmorPolicy {
    snippets: IndexMap<String, Vec<String>>,
}

impl AppArmorPolicy {
    /// Distinct security tags, in first-seen order.
    pub fn security_tags(&self) -> Vec<&str> {
        self.snippets.keys().map(String::as_str).collect()
    }

    /// Snippets for one tag in insertion order; empty if the tag is unknown.
    pub fn snippets_for_tag(&self, tag: &str) -> &[String] {
        self.snippets.get(tag).map(Vec::as_slice).unwrap_or_default()
    }

    /// All snippets for one tag joined with newlines.
    pub fn snippet_for_tag(&self, tag: &str) -> String {
        self.snippets_for_tag(tag).join("\n")
    }

    /// Whether no tag received any snippet.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}
