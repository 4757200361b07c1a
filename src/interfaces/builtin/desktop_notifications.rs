//! `desktop-notifications`: posting notifications to the session's
//! notification server.
//!
//! Covers both the freedesktop `org.freedesktop.Notifications` service and
//! the GTK `org.gtk.Notifications` one. Plugs may carry a `desktop-entry`
//! attribute naming the desktop file notifications are attributed to.

use std::sync::LazyLock;

use regex::Regex;

use crate::interfaces::{
    apparmor, assert_plug_interface, ConnectedPlug, ConnectedSlot, Interface, InterfaceError,
    SanitizeError, SnippetTemplate,
};
use crate::release::ExecutionEnvironment;
use crate::snap::{AttrValue, Endpoint, PlugInfo, SlotInfo};

/// Capability type name.
pub const NAME: &str = "desktop-notifications";

/// Plug attribute naming the desktop file of the notifying application.
pub const DESKTOP_ENTRY_ATTR: &str = "desktop-entry";

const MAX_DESKTOP_ENTRY_LEN: usize = 255;

static DESKTOP_ENTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*$").expect("desktop entry pattern is valid")
});

const PERMANENT_SLOT_APPARMOR: &str = r#"
# Description: Allow owning the notification server name on the session bus

#include <abstractions/dbus-session-strict>

dbus (send)
    bus=session
    path=/org/freedesktop/DBus
    interface=org.freedesktop.DBus
    member=(RequestName|ReleaseName|GetConnectionCredentials)
    peer=(name=org.freedesktop.DBus, label=unconfined),

dbus (bind)
    bus=session
    name=org.freedesktop.Notifications,

dbus (bind)
    bus=session
    name=org.gtk.Notifications,
"#;

const CONNECTED_SLOT_APPARMOR: SnippetTemplate = SnippetTemplate::new(
    r#"
# Description: allow client snaps to post notifications and get their signals.
dbus (receive)
    bus=session
    path=/org/freedesktop/Notifications
    interface=org.freedesktop.Notifications
    member="{Notify,CloseNotification,GetCapabilities,GetServerInformation}"
    peer=(label=###PLUG_SECURITY_TAGS###),

dbus (send)
    bus=session
    path=/org/freedesktop/Notifications
    interface=org.freedesktop.Notifications
    member="{NotificationClosed,ActionInvoked}"
    peer=(label=###PLUG_SECURITY_TAGS###),

dbus (receive)
    bus=session
    path=/org/gtk/Notifications
    interface=org.gtk.Notifications
    member="{AddNotification,RemoveNotification}"
    peer=(label=###PLUG_SECURITY_TAGS###),
"#,
);

const CONNECTED_PLUG_APPARMOR: SnippetTemplate = SnippetTemplate::new(
    r#"
# Description: allow posting desktop notifications.

#include <abstractions/dbus-session-strict>

dbus (send)
    bus=session
    path=/org/freedesktop/Notifications
    interface=org.freedesktop.Notifications
    member="{Notify,CloseNotification,GetCapabilities,GetServerInformation}"
    peer=(label=###SLOT_SECURITY_TAGS###),

dbus (receive)
    bus=session
    path=/org/freedesktop/Notifications
    interface=org.freedesktop.Notifications
    member="{NotificationClosed,ActionInvoked}"
    peer=(label=###SLOT_SECURITY_TAGS###),

dbus (send)
    bus=session
    path=/org/gtk/Notifications
    interface=org.gtk.Notifications
    member="{AddNotification,RemoveNotification}"
    peer=(label=###SLOT_SECURITY_TAGS###),
"#,
);

/// Check a `desktop-entry` value, returning why it is unusable.
fn check_desktop_entry(value: &AttrValue) -> Result<&str, String> {
    let Some(entry) = value.as_str() else {
        return Err(format!("expected string, got {}", value.kind()));
    };
    if entry.len() > MAX_DESKTOP_ENTRY_LEN {
        return Err(format!("longer than {MAX_DESKTOP_ENTRY_LEN} characters"));
    }
    if !DESKTOP_ENTRY_RE.is_match(entry) {
        return Err(format!("{entry:?} is not a desktop file id"));
    }
    Ok(entry)
}

/// The `desktop-notifications` capability type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifications;

impl Interface for DesktopNotifications {
    fn name(&self) -> &'static str {
        NAME
    }

    fn sanitize_plug(&self, plug: &PlugInfo) -> Result<(), SanitizeError> {
        assert_plug_interface(NAME, plug);
        if let Some(value) = plug.attr(DESKTOP_ENTRY_ATTR) {
            check_desktop_entry(value).map_err(|reason| SanitizeError::InvalidAttribute {
                interface: NAME,
                endpoint: plug.to_string(),
                attribute: DESKTOP_ENTRY_ATTR.to_owned(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Only the platform's own notification server is trusted implicitly.
    fn auto_connect(&self, _plug: &PlugInfo, slot: &SlotInfo, _env: ExecutionEnvironment) -> bool {
        slot.is_platform_owned()
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
        plug: &ConnectedPlug<'_>,
        slot: &ConnectedSlot<'_>,
    ) -> Result<(), InterfaceError> {
        // Connection attributes skip sanitization, so re-check the late-bound value.
        if let Some(value) = plug.attr(DESKTOP_ENTRY_ATTR) {
            check_desktop_entry(value).map_err(|reason| InterfaceError::Attribute {
                attribute: DESKTOP_ENTRY_ATTR.to_owned(),
                reason,
            })?;
        }
        let snippet = CONNECTED_PLUG_APPARMOR.render(&[("SLOT_SECURITY_TAGS", slot.label())])?;
        spec.add_snippet(snippet);
        Ok(())
    }
}
