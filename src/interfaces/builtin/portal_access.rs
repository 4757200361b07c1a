//! `portal-access`: desktop portal and document portal access.
//!
//! The slot side owns the portal bus names; the plug side may talk to the
//! portal and gets the document portal's per-app view bind-mounted over the
//! shared document directory.

use crate::interfaces::mount::{self, Entry};
use crate::interfaces::{
    apparmor, ConnectedPlug, ConnectedSlot, Interface, InterfaceError, SnippetTemplate,
};
use crate::release::ExecutionEnvironment;
use crate::snap::{validate_snap_name, PlugInfo, SlotInfo};

/// Capability type name.
pub const NAME: &str = "portal-access";

/// Session user whose document portal is mounted.
// TODO: resolve the session user per login instead of assuming the first
// desktop user.
pub const DOCUMENT_PORTAL_UID: u32 = 1000;

const PERMANENT_SLOT_APPARMOR: &str = r#"
# Description: Allow owning the Desktop portal bus names on the session bus

#include <abstractions/dbus-session-strict>

dbus (send)
    bus=session
    path=/org/freedesktop/DBus
    interface=org.freedesktop.DBus
    member=(RequestName|ReleaseName|GetConnectionCredentials|GetConnectionUnixProcessID)
    peer=(name=org.freedesktop.DBus, label=unconfined),

dbus (bind)
    bus=session
    name=org.freedesktop.portal.{Desktop,Documents},
"#;

const CONNECTED_SLOT_APPARMOR: SnippetTemplate = SnippetTemplate::new(
    r#"
# Description: allow client snaps to access the desktop portal service.
dbus (receive, send)
    bus=session
    interface=org.freedesktop.portal.*
    path=/org/freedesktop/portal/{desktop,documents}
    peer=(label=###PLUG_SECURITY_TAGS###),

dbus (receive, send)
    bus=session
    interface=org.freedesktop.DBus.Properties
    path=/org/freedesktop/portal/{desktop,documents}
    peer=(label=###PLUG_SECURITY_TAGS###),
"#,
);

const CONNECTED_PLUG_APPARMOR: SnippetTemplate = SnippetTemplate::new(
    r#"
# Description: allow access to the document portal file system.
owner /run/user/[0-9]*/doc/** rw,

# Description: allow access to the desktop portal D-Bus service.

#include <abstractions/dbus-session-strict>

dbus (receive, send)
    bus=session
    interface=org.freedesktop.portal.*
    path=/org/freedesktop/portal/{desktop,documents}
    peer=(label=###SLOT_SECURITY_TAGS###),

dbus (receive, send)
    bus=session
    interface=org.freedesktop.DBus.Properties
    path=/org/freedesktop/portal/{desktop,documents}
    peer=(label=###SLOT_SECURITY_TAGS###),
"#,
);

/// Document portal mount root for [`DOCUMENT_PORTAL_UID`].
fn document_dir() -> String {
    format!("/run/user/{DOCUMENT_PORTAL_UID}/doc")
}

/// The `portal-access` capability type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortalAccess;

impl Interface for PortalAccess {
    fn name(&self) -> &'static str {
        NAME
    }

    fn auto_connect(&self, _plug: &PlugInfo, _slot: &SlotInfo, _env: ExecutionEnvironment) -> bool {
        true
    }

    fn apparmor_permanent_slot(
        &self,
        spec: &mut apparmor::Specification,
        _slot: &SlotInfo,
    ) -> Result<(), InterfaceError> {
        spec.add_snippet(PERMANENT_SLOT_APPARMOR);
        Ok(())
    }

    fn apparmor_connected_slot(
        &self,
        spec: &mut apparmor::Specification,
        plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        let snippet = CONNECTED_SLOT_APPARMOR.render(&[("PLUG_SECURITY_TAGS", plug.label())])?;
        spec.add_snippet(snippet);
        Ok(())
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        _plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        let snippet = CONNECTED_PLUG_APPARMOR.render(&[("SLOT_SECURITY_TAGS", slot.label())])?;
        spec.add_snippet(snippet);
        Ok(())
    }

    fn mount_connected_plug(
        &self,
        spec: &mut mount::Specification,
        plug: &ConnectedPlug<'_>,
        _slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        validate_snap_name(plug.snap())?;
        let app_id = format!("snap.pkg.{}", plug.snap());
        let dir = document_dir();
        spec.add_mount_entry(Entry::bind(
            format!("{dir}/by-app/{app_id}"),
            dir,
            &["bind", "rw"],
        ));
        Ok(())
    }
}
