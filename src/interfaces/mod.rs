//! Capability types (interfaces) and the policy they generate.
//!
//! Every capability type implements [`Interface`]. The hooks are grouped by
//! backend; an implementation overrides only the ones relevant to what it
//! confines, the rest are no-ops. A [`Registry`] maps type names to their
//! single implementation and the [`Composer`] walks a snap's endpoints and
//! connections to fill one [`Specification`] per backend.

pub mod apparmor;
pub mod backends;
pub mod builtin;
pub mod connection;
pub mod labels;
pub mod mount;
pub mod policy;
pub mod registry;
pub mod template;

use thiserror::Error;

use crate::release::ExecutionEnvironment;
use crate::snap::{Endpoint, PlugInfo, SlotInfo, SnapError};

pub use backends::{Backend, Composer, GeneratedPolicy, GenerationError, GenerationReport, Hook};
pub use connection::{ConnRef, ConnectedPlug, ConnectedSlot, Connection};
pub use labels::{LabelBuilder, LabelError, LabelExpr};
pub use policy::{AutoConnectDecision, Sanitized};
pub use registry::{builtin_registry, Registry, RegistryBuilder};
pub use template::{SnippetTemplate, TemplateError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A plug or slot declaration that cannot take part in connections.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// No registered capability type has the declared name.
    #[error("{endpoint} uses unknown interface {interface:?}")]
    UnknownInterface {
        /// `snap:name` of the endpoint.
        endpoint: String,
        /// The declared interface name.
        interface: String,
    },
    /// An attribute value is malformed.
    #[error("{interface} {endpoint}: invalid attribute {attribute:?}: {reason}")]
    InvalidAttribute {
        /// Capability type name.
        interface: &'static str,
        /// `snap:name` of the endpoint.
        endpoint: String,
        /// Offending attribute key.
        attribute: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// A hook could not produce policy from otherwise well-typed input.
#[derive(Debug, Error)]
pub enum InterfaceError {
    /// A snippet template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// A peer label could not be computed.
    #[error(transparent)]
    Label(#[from] LabelError),
    /// A name that ends up in generated text is not valid.
    #[error(transparent)]
    Snap(#[from] SnapError),
    /// An attribute refers to something that cannot be confined.
    #[error("attribute {attribute:?}: {reason}")]
    Attribute {
        /// Offending attribute key.
        attribute: String,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Interface contract
// ---------------------------------------------------------------------------

/// Abort if a plug was routed to the wrong capability type.
///
/// Routing by type name happens before any hook runs, so a mismatch is a
/// caller defect rather than bad input.
pub fn assert_plug_interface(iface: &str, plug: &PlugInfo) {
    if plug.interface() != iface {
        panic!("plug is not of interface {iface:?}");
    }
}

/// Abort if a slot was routed to the wrong capability type.
pub fn assert_slot_interface(iface: &str, slot: &SlotInfo) {
    if slot.interface() != iface {
        panic!("slot is not of interface {iface:?}");
    }
}

/// Abort unless both sides of a connection belong to `iface`.
pub fn assert_connected_interface(iface: &str, plug: &ConnectedPlug<'_>, slot: &ConnectedSlot<'_>) {
    assert_plug_interface(iface, plug.info());
    assert_slot_interface(iface, slot.info());
}

/// A capability type and the policy it contributes to every backend.
///
/// Implementations are stateless and shared across concurrent passes.
pub trait Interface: Send + Sync {
    /// Unique capability type name, the registry key.
    fn name(&self) -> &'static str;

    /// Validate a plug declaration.
    ///
    /// # Panics
    ///
    /// Panics if the plug is declared under a different interface name.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::InvalidAttribute`] for malformed attributes.
    fn sanitize_plug(&self, plug: &PlugInfo) -> Result<(), SanitizeError> {
        assert_plug_interface(self.name(), plug);
        Ok(())
    }

    /// Validate a slot declaration.
    ///
    /// # Panics
    ///
    /// Panics if the slot is declared under a different interface name.
    ///
    /// # Errors
    ///
    /// Returns [`SanitizeError::InvalidAttribute`] for malformed attributes.
    fn sanitize_slot(&self, slot: &SlotInfo) -> Result<(), SanitizeError> {
        assert_slot_interface(self.name(), slot);
        Ok(())
    }

    /// Whether the pair may be connected at install time without consent.
    ///
    /// Must be a pure function of its inputs.
    fn auto_connect(&self, _plug: &PlugInfo, _slot: &SlotInfo, _env: ExecutionEnvironment) -> bool {
        false
    }

    /// AppArmor rules present while the plug's snap is installed.
    ///
    /// Permanent hooks run once per snap and interface. The composer passes
    /// a representative endpoint bound to every app of that interface, with
    /// attributes merged first-declaration-wins.
    fn apparmor_permanent_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &PlugInfo,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// AppArmor rules present while the slot's snap is installed.
    fn apparmor_permanent_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _slot: &SlotInfo,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// AppArmor rules for the plug side of an active connection.
    fn apparmor_connected_plug(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// AppArmor rules for the slot side of an active connection.
    fn apparmor_connected_slot(
        &self,
        _spec: &mut apparmor::Specification,
        _plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// Mount entries present while the plug's snap is installed.
    fn mount_permanent_plug(
        &self,
        _spec: &mut mount::Specification,
        _plug: &PlugInfo,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// Mount entries present while the slot's snap is installed.
    fn mount_permanent_slot(
        &self,
        _spec: &mut mount::Specification,
        _slot: &SlotInfo,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// Mount entries for the plug side of an active connection.
    fn mount_connected_plug(
        &self,
        _spec: &mut mount::Specification,
        _plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }

    /// Mount entries for the slot side of an active connection.
    fn mount_connected_slot(
        &self,
        _spec: &mut mount::Specification,
        _plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        Ok(())
    }
}

/// A per-backend accumulator that knows which [`Interface`] hooks feed it.
///
/// One instance per backend per pass; never shared between passes.
pub trait Specification: Default {
    /// Read-only view produced once the pass is over.
    type Output;

    /// Backend this specification belongs to.
    const BACKEND: Backend;

    /// Run the permanent plug hook.
    ///
    /// # Panics
    ///
    /// Panics if the plug is not of `iface`'s type.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`InterfaceError`].
    fn add_permanent_plug(&mut self, iface: &dyn Interface, plug: &PlugInfo) -> Result<(), InterfaceError>;

    /// Run the permanent slot hook.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not of `iface`'s type.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`InterfaceError`].
    fn add_permanent_slot(&mut self, iface: &dyn Interface, slot: &SlotInfo) -> Result<(), InterfaceError>;

    /// Run the connected plug hook.
    ///
    /// # Panics
    ///
    /// Panics if either side of the connection is not of `iface`'s type.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`InterfaceError`].
    fn add_connected_plug(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError>;

    /// Run the connected slot hook.
    ///
    /// # Panics
    ///
    /// Panics if either side of the connection is not of `iface`'s type.
    ///
    /// # Errors
    ///
    /// Propagates the hook's [`InterfaceError`].
    fn add_connected_slot(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError>;

    /// Freeze the accumulated state.
    fn finish(self) -> Self::Output;
}
