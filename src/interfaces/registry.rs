//! Registry of capability type implementations.
//!
//! Built once at startup through [`RegistryBuilder`] and frozen into an
//! immutable [`Registry`]; lookups need no locking afterwards.

use std::sync::LazyLock;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::policy::Sanitized;
use super::{builtin, Interface, SanitizeError};
use crate::snap::{PlugInfo, SlotInfo, SnapInfo};

/// Collects interfaces before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    ifaces: IndexMap<&'static str, Box<dyn Interface>>,
}

impl RegistryBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one interface.
    ///
    /// # Panics
    ///
    /// Panics if an interface with the same name is already registered;
    /// that is a startup configuration defect.
    pub fn register(mut self, iface: Box<dyn Interface>) -> Self {
        let name = iface.name();
        if self.ifaces.contains_key(name) {
            panic!("interface {name:?} is registered twice");
        }
        debug!(interface = name, "interface registered");
        self.ifaces.insert(name, iface);
        self
    }

    /// Freeze into an immutable registry.
    pub fn build(self) -> Registry {
        info!(count = self.ifaces.len(), "interface registry built");
        Registry {
            ifaces: self.ifaces,
        }
    }
}

/// Immutable name → implementation table.
pub struct Registry {
    ifaces: IndexMap<&'static str, Box<dyn Interface>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("interfaces", &self.ifaces.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Registry holding every builtin interface.
    pub fn builtin() -> Self {
        builtin::interfaces()
            .into_iter()
            .fold(RegistryBuilder::new(), RegistryBuilder::register)
            .build()
    }

    /// Look up an interface by name.
    pub fn get(&self, name: &str) -> Option<&dyn Interface> {
        self.ifaces.get(name).map(Box::as_ref)
    }

    /// Look up an interface that must exist.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not registered. Only use this for names taken
    /// from already-sanitized endpoints.
    pub fn expect(&self, name: &str) -> &dyn Interface {
        match self.get(name) {
            Some(iface) => iface,
            None => panic!("interface {name:?} is not registered"),
        }
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ifaces.keys().copied()
    }

    /// Number of registered interfaces.
    pub fn len(&self) -> usize {
        self.ifaces.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.ifaces.is_empty()
    }

    /// Route a plug to its interface and sanitize it.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::UnknownInterface`] if the declared interface
    /// is not registered, or whatever the interface's sanitizer reports.
    pub fn sanitize_plug(&self, plug: PlugInfo) -> Result<Sanitized<PlugInfo>, SanitizeError> {
        let iface = self
            .get(&plug.interface)
            .ok_or_else(|| SanitizeError::UnknownInterface {
                endpoint: plug.to_string(),
                interface: plug.interface.clone(),
            })?;
        iface.sanitize_plug(&plug)?;
        Ok(Sanitized::new(plug))
    }

    /// Route a slot to its interface and sanitize it.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::UnknownInterface`] if the declared interface
    /// is not registered, or whatever the interface's sanitizer reports.
    pub fn sanitize_slot(&self, slot: SlotInfo) -> Result<Sanitized<SlotInfo>, SanitizeError> {
        let iface = self
            .get(&slot.interface)
            .ok_or_else(|| SanitizeError::UnknownInterface {
                endpoint: slot.to_string(),
                interface: slot.interface.clone(),
            })?;
        iface.sanitize_slot(&slot)?;
        Ok(Sanitized::new(slot))
    }

    /// Sanitize every plug and slot of a snap.
    ///
    /// # Errors
    ///
    /// Returns the first endpoint's [`SanitizeError`]; the snap as a whole
    /// is then not usable for generation.
    pub fn sanitize_snap(&self, snap: SnapInfo) -> Result<Sanitized<SnapInfo>, SanitizeError> {
        for plug in snap.plugs.values() {
            self.sanitize_plug(plug.clone())?;
        }
        for slot in snap.slots.values() {
            self.sanitize_slot(slot.clone())?;
        }
        debug!(snap = %snap.name, plugs = snap.plugs.len(), slots = snap.slots.len(), "snap sanitized");
        Ok(Sanitized::new(snap))
    }
}

static BUILTIN: LazyLock<Registry> = LazyLock::new(Registry::builtin);

/// Process-wide registry of builtin interfaces, built on first use.
pub fn builtin_registry() -> &'static Registry {
    &BUILTIN
}
