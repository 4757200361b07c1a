//! Connections between a plug and a slot, and the per-side views hooks see.

use std::fmt;

use super::labels::LabelExpr;
use super::policy::Sanitized;
use crate::snap::{AttrValue, Attributes, Endpoint, PlugInfo, SlotInfo};

/// Identifies a connection by its two endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnRef {
    /// Snap owning the plug.
    pub plug_snap: String,
    /// Plug name.
    pub plug_name: String,
    /// Snap owning the slot.
    pub slot_snap: String,
    /// Slot name.
    pub slot_name: String,
}

impl fmt::Display for ConnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}:{}",
            self.plug_snap, self.plug_name, self.slot_snap, self.slot_name
        )
    }
}

/// An active pairing of one plug and one slot of the same interface.
///
/// Both endpoints must have passed sanitization, which the constructor
/// enforces through [`Sanitized`].
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    plug: PlugInfo,
    slot: SlotInfo,
    plug_attrs: Attributes,
    slot_attrs: Attributes,
}

impl Connection {
    /// Join a sanitized plug and slot.
    ///
    /// # Panics
    ///
    /// Panics if the two endpoints declare different interfaces; callers
    /// only ever pair endpoints of the same type.
    pub fn new(plug: &Sanitized<PlugInfo>, slot: &Sanitized<SlotInfo>) -> Self {
        if plug.interface != slot.interface {
            panic!(
                "cannot connect plug {} of interface {:?} to slot {} of interface {:?}",
                **plug, plug.interface, **slot, slot.interface
            );
        }
        Self {
            plug: (**plug).clone(),
            slot: (**slot).clone(),
            plug_attrs: Attributes::new(),
            slot_attrs: Attributes::new(),
        }
    }

    /// Attach attributes negotiated for this connection.
    ///
    /// They shadow the static declaration attributes of the same key.
    pub fn with_dynamic_attrs(mut self, plug_attrs: Attributes, slot_attrs: Attributes) -> Self {
        self.plug_attrs = plug_attrs;
        self.slot_attrs = slot_attrs;
        self
    }

    /// Interface shared by both endpoints.
    pub fn interface(&self) -> &str {
        &self.plug.interface
    }

    /// The plug endpoint.
    pub fn plug(&self) -> &PlugInfo {
        &self.plug
    }

    /// The slot endpoint.
    pub fn slot(&self) -> &SlotInfo {
        &self.slot
    }

    /// Dynamic plug-side attributes.
    pub fn plug_attrs(&self) -> &Attributes {
        &self.plug_attrs
    }

    /// Dynamic slot-side attributes.
    pub fn slot_attrs(&self) -> &Attributes {
        &self.slot_attrs
    }

    /// Reference naming both endpoints.
    pub fn conn_ref(&self) -> ConnRef {
        ConnRef {
            plug_snap: self.plug.snap.clone(),
            plug_name: self.plug.name.clone(),
            slot_snap: self.slot.snap.clone(),
            slot_name: self.slot.name.clone(),
        }
    }

    /// Whether either endpoint belongs to `snap`.
    pub fn involves(&self, snap: &str) -> bool {
        self.plug.snap == snap || self.slot.snap == snap
    }
}

/// The plug side of a connection as seen by a connected hook.
#[derive(Debug, Clone)]
pub struct ConnectedPlug<'a> {
    info: &'a PlugInfo,
    dynamic: &'a Attributes,
    label: LabelExpr,
}

impl<'a> ConnectedPlug<'a> {
    /// View over a plug with its resolved label and dynamic attributes.
    pub fn new(info: &'a PlugInfo, dynamic: &'a Attributes, label: LabelExpr) -> Self {
        Self {
            info,
            dynamic,
            label,
        }
    }

    /// Static declaration.
    pub fn info(&self) -> &'a PlugInfo {
        self.info
    }

    /// Label expression naming the plug's entry points.
    pub fn label(&self) -> &LabelExpr {
        &self.label
    }

    /// Attribute lookup, connection attributes first.
    pub fn attr(&self, key: &str) -> Option<&'a AttrValue> {
        self.dynamic.get(key).or_else(|| self.info.attr(key))
    }

    /// Owning snap name.
    pub fn snap(&self) -> &'a str {
        &self.info.snap
    }
}

/// The slot side of a connection as seen by a connected hook.
#[derive(Debug, Clone)]
pub struct ConnectedSlot<'a> {
    info: &'a SlotInfo,
    dynamic: &'a Attributes,
    label: LabelExpr,
}

impl<'a> ConnectedSlot<'a> {
    /// View over a slot with its resolved label and dynamic attributes.
    pub fn new(info: &'a SlotInfo, dynamic: &'a Attributes, label: LabelExpr) -> Self {
        Self {
            info,
            dynamic,
            label,
        }
    }

    /// Static declaration.
    pub fn info(&self) -> &'a SlotInfo {
        self.info
    }

    /// Label expression naming the slot's entry points, or unconfined.
    pub fn label(&self) -> &LabelExpr {
        &self.label
    }

    /// Attribute lookup, connection attributes first.
    pub fn attr(&self, key: &str) -> Option<&'a AttrValue> {
        self.dynamic.get(key).or_else(|| self.info.attr(key))
    }

    /// Owning snap name.
    pub fn snap(&self) -> &'a str {
        &self.info.snap
    }
}
