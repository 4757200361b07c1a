//! Mount backend: per-snap bind mount entries.
//!
//! Entries are keyed by `(name, dir)`. The first entry for a pair wins and
//! later ones are dropped whatever their options.

use std::fmt;

use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::backends::Backend;
use super::connection::{ConnectedPlug, ConnectedSlot};
use super::{
    assert_connected_interface, assert_plug_interface, assert_slot_interface, Interface,
    InterfaceError,
};
use crate::snap::{PlugInfo, SlotInfo};

/// One fstab-style mount entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Mount source.
    pub name: String,
    /// Mount target directory.
    pub dir: String,
    /// Filesystem type; `none` for bind mounts.
    pub fs_type: String,
    /// Mount options.
    pub options: Vec<String>,
    /// fstab dump frequency.
    pub dump_frequency: u32,
    /// fstab fsck pass number.
    pub check_pass: u32,
}

impl Entry {
    /// A bind mount of `name` onto `dir`.
    pub fn bind(name: impl Into<String>, dir: impl Into<String>, options: &[&str]) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            fs_type: "none".to_owned(),
            options: options.iter().map(|o| (*o).to_owned()).collect(),
            dump_frequency: 0,
            check_pass: 0,
        }
    }
}

/// Escape whitespace and backslashes the way fstab expects.
fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => out.push_str("\\040"),
            '\t' => out.push_str("\\011"),
            '\n' => out.push_str("\\012"),
            '\\' => out.push_str("\\134"),
            _ => out.push(c),
        }
    }
    out
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = if self.options.is_empty() {
            "defaults".to_owned()
        } else {
            self.options.join(",")
        };
        let fs_type = if self.fs_type.is_empty() {
            "none"
        } else {
            &self.fs_type
        };
        write!(
            f,
            "{} {} {} {} {} {}",
            escape(&self.name),
            escape(&self.dir),
            escape(fs_type),
            escape(&options),
            self.dump_frequency,
            self.check_pass
        )
    }
}

/// Accumulates mount entries during one generation pass.
#[derive(Debug, Default)]
pub struct Specification {
    entries: IndexMap<(String, String), Entry>,
}

impl Specification {
    /// Empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry unless its `(name, dir)` pair is already present.
    ///
    /// Returns whether the entry was added.
    pub fn add_mount_entry(&mut self, entry: Entry) -> bool {
        match self.entries.entry((entry.name.clone(), entry.dir.clone())) {
            MapEntry::Occupied(existing) => {
                if existing.get().options != entry.options {
                    debug!(
                        name = %entry.name,
                        dir = %entry.dir,
                        kept = ?existing.get().options,
                        dropped = ?entry.options,
                        "duplicate mount entry with different options dropped"
                    );
                }
                false
            }
            MapEntry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Entries added so far.
    pub fn mount_entries(&self) -> Vec<&Entry> {
        self.entries.values().collect()
    }
}

impl super::Specification for Specification {
    type Output = MountProfile;

    const BACKEND: Backend = Backend::Mount;

    fn add_permanent_plug(&mut self, iface: &dyn Interface, plug: &PlugInfo) -> Result<(), InterfaceError> {
        assert_plug_interface(iface.name(), plug);
        iface.mount_permanent_plug(self, plug)
    }

    fn add_permanent_slot(&mut self, iface: &dyn Interface, slot: &SlotInfo) -> Result<(), InterfaceError> {
        assert_slot_interface(iface.name(), slot);
        iface.mount_permanent_slot(self, slot)
    }

    fn add_connected_plug(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        assert_connected_interface(iface.name(), plug, slot);
        iface.mount_connected_plug(self, plug, slot)
    }

    fn add_connected_slot(
        &mut self,
        iface: &dyn Interface,
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        assert_connected_interface(iface.name(), plug, slot);
        iface.mount_connected_slot(self, plug, slot)
    }

    fn finish(self) -> MountProfile {
        MountProfile {
            entries: self.entries.into_values().collect(),
        }
    }
}

/// Finished, read-only mount output of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountProfile {
    entries: Vec<Entry>,
}

impl MountProfile {
    /// Entries in insertion order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Render as fstab text, one entry per line.
    pub fn fstab(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{e}\n"))
            .collect()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
