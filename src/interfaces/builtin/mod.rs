//! Capability types shipped with the platform.

pub mod desktop_notifications;
pub mod portal_access;

pub use desktop_notifications::DesktopNotifications;
pub use portal_access::PortalAccess;

use super::Interface;

/// One instance of every builtin capability type.
pub fn interfaces() -> Vec<Box<dyn Interface>> {
    vec![Box::new(PortalAccess), Box::new(DesktopNotifications)]
}
