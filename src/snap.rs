//! Application (snap) model: declarations, entry points, plugs and slots.
//!
//! A [`SnapInfo`] owns its declared [`PlugInfo`]s and [`SlotInfo`]s. The
//! endpoints refer back to their owner by name only, together with the
//! owner's type and the entry points they are bound to, which is all label
//! computation needs.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// Maximum length of a snap name.
const MAX_SNAP_NAME_LEN: usize = 40;

static SNAP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9]+-?)*[a-z](?:-?[a-z0-9])*$").expect("snap name pattern is valid")
});

static APP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:-?[a-zA-Z0-9])*$").expect("app name pattern is valid")
});

/// Errors raised while turning a declaration into a [`SnapInfo`].
#[derive(Debug, Error)]
pub enum SnapError {
    /// Snap name does not follow the naming rules.
    #[error("invalid snap name: {0:?}")]
    InvalidSnapName(String),
    /// Entry point name does not follow the naming rules.
    #[error("invalid app name: {0:?}")]
    InvalidAppName(String),
    /// Plug name does not follow the naming rules.
    #[error("invalid plug name: {0:?}")]
    InvalidPlugName(String),
    /// Slot name does not follow the naming rules.
    #[error("invalid slot name: {0:?}")]
    InvalidSlotName(String),
    /// Interface name does not follow the naming rules.
    #[error("invalid interface name {interface:?} on {endpoint:?}")]
    InvalidInterfaceName {
        /// Plug or slot carrying the bad name.
        endpoint: String,
        /// The offending interface name.
        interface: String,
    },
    /// The same name is declared both as a plug and as a slot.
    #[error("cannot have plug and slot with the same name: {0:?}")]
    PlugSlotClash(String),
    /// Failed to parse a declaration document.
    #[error("failed to parse snap declaration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Validate a snap name.
///
/// # Errors
///
/// Returns [`SnapError::InvalidSnapName`] if the name is empty, too long,
/// or contains characters outside `[a-z0-9-]`.
pub fn validate_snap_name(name: &str) -> Result<(), SnapError> {
    if name.len() > MAX_SNAP_NAME_LEN || !SNAP_NAME_RE.is_match(name) {
        return Err(SnapError::InvalidSnapName(name.to_owned()));
    }
    Ok(())
}

/// Validate an entry point (app) name.
///
/// # Errors
///
/// Returns [`SnapError::InvalidAppName`] for anything outside
/// `[a-zA-Z0-9-]` or with leading, trailing or doubled dashes.
pub fn validate_app_name(name: &str) -> Result<(), SnapError> {
    if !APP_NAME_RE.is_match(name) {
        return Err(SnapError::InvalidAppName(name.to_owned()));
    }
    Ok(())
}

fn is_valid_endpoint_name(name: &str) -> bool {
    name.len() <= MAX_SNAP_NAME_LEN && SNAP_NAME_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// A single plug or slot attribute value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Plain string.
    Str(String),
    /// Ordered list of values.
    List(Vec<AttrValue>),
    /// Nested mapping.
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// The value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a bool, if it is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Short type name used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// String-keyed attribute mapping of a plug, slot or connection side.
pub type Attributes = BTreeMap<String, AttrValue>;

// ---------------------------------------------------------------------------
// Snap, plugs and slots
// ---------------------------------------------------------------------------

/// Kind of package. Only `os` matters for policy: it marks the platform
/// itself as the owner of an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapType {
    /// Ordinary application.
    #[default]
    App,
    /// The platform's own core package.
    Os,
    /// Device gadget.
    Gadget,
    /// Kernel package.
    Kernel,
    /// Base runtime.
    Base,
}

/// Read-only view shared by plugs and slots.
pub trait Endpoint {
    /// Name of the owning snap.
    fn snap(&self) -> &str;
    /// Type of the owning snap.
    fn snap_type(&self) -> SnapType;
    /// Name of the plug or slot within its snap.
    fn name(&self) -> &str;
    /// Declared interface (capability type) name.
    fn interface(&self) -> &str;
    /// Static attributes from the declaration.
    fn attrs(&self) -> &Attributes;
    /// Entry points this endpoint is bound to, sorted.
    fn apps(&self) -> &[String];

    /// Whether the platform itself provides or consumes through this endpoint.
    fn is_platform_owned(&self) -> bool {
        self.snap_type() == SnapType::Os
    }

    /// Security tags of every bound entry point, sorted.
    fn security_tags(&self) -> Vec<String> {
        self.apps()
            .iter()
            .map(|app| security_tag(self.snap(), app))
            .collect()
    }

    /// Look up a static attribute.
    fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs().get(key)
    }
}

/// Security tag of one entry point: `snap.<snap>.<app>`.
pub fn security_tag(snap: &str, app: &str) -> String {
    format!("snap.{snap}.{app}")
}

/// A declared point where a snap consumes a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct PlugInfo {
    /// Owning snap name.
    pub snap: String,
    /// Owning snap type.
    pub snap_type: SnapType,
    /// Plug name.
    pub name: String,
    /// Interface the plug consumes.
    pub interface: String,
    /// Declared attributes.
    pub attrs: Attributes,
    /// Bound entry points, sorted.
    pub apps: Vec<String>,
}

/// A declared point where a snap (or the platform) provides a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    /// Owning snap name.
    pub snap: String,
    /// Owning snap type.
    pub snap_type: SnapType,
    /// Slot name.
    pub name: String,
    /// Interface the slot provides.
    pub interface: String,
    /// Declared attributes.
    pub attrs: Attributes,
    /// Bound entry points, sorted.
    pub apps: Vec<String>,
}

macro_rules! impl_endpoint {
    ($ty:ty) => {
        impl Endpoint for $ty {
            fn snap(&self) -> &str {
                &self.snap
            }
            fn snap_type(&self) -> SnapType {
                self.snap_type
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn interface(&self) -> &str {
                &self.interface
            }
            fn attrs(&self) -> &Attributes {
                &self.attrs
            }
            fn apps(&self) -> &[String] {
                &self.apps
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}:{}", self.snap, self.name)
            }
        }
    };
}

impl_endpoint!(PlugInfo);
impl_endpoint!(SlotInfo);

/// An installed snap with its entry points and endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapInfo {
    /// Snap name.
    pub name: String,
    /// Snap type.
    pub snap_type: SnapType,
    /// Entry point names, sorted.
    pub apps: Vec<String>,
    /// Declared plugs by name.
    pub plugs: BTreeMap<String, PlugInfo>,
    /// Declared slots by name.
    pub slots: BTreeMap<String, SlotInfo>,
}

impl SnapInfo {
    /// Parse and validate a TOML snap declaration.
    ///
    /// # Errors
    ///
    /// Returns [`SnapError`] if the document does not parse or any name is
    /// invalid.
    pub fn from_toml(contents: &str) -> Result<Self, SnapError> {
        let decl: SnapDeclaration = toml::from_str(contents)?;
        Self::from_declaration(decl)
    }

    /// Build a validated [`SnapInfo`] from a parsed declaration.
    ///
    /// Endpoints declared at top level and not referenced by any app are
    /// bound to every app. Endpoints named only inside an app are implicit:
    /// their interface is their name and they are bound to that app alone.
    ///
    /// # Errors
    ///
    /// Returns [`SnapError`] if any name is invalid or a name is used for
    /// both a plug and a slot.
    pub fn from_declaration(decl: SnapDeclaration) -> Result<Self, SnapError> {
        validate_snap_name(&decl.name)?;
        for app in decl.apps.keys() {
            validate_app_name(app)?;
        }

        let all_apps: Vec<String> = decl.apps.keys().cloned().collect();
        let plug_bindings = bindings(&decl.apps, |app| &app.plugs);
        let slot_bindings = bindings(&decl.apps, |app| &app.slots);

        let mut plugs = BTreeMap::new();
        for (name, interface, attrs) in collect_endpoints(&decl.plugs, &plug_bindings) {
            if !is_valid_endpoint_name(&name) {
                return Err(SnapError::InvalidPlugName(name));
            }
            check_interface_name(&name, &interface)?;
            let apps = plug_bindings
                .get(&name)
                .cloned()
                .unwrap_or_else(|| all_apps.clone());
            plugs.insert(
                name.clone(),
                PlugInfo {
                    snap: decl.name.clone(),
                    snap_type: decl.snap_type,
                    name,
                    interface,
                    attrs,
                    apps,
                },
            );
        }

        let mut slots = BTreeMap::new();
        for (name, interface, attrs) in collect_endpoints(&decl.slots, &slot_bindings) {
            if !is_valid_endpoint_name(&name) {
                return Err(SnapError::InvalidSlotName(name));
            }
            if plugs.contains_key(&name) {
                return Err(SnapError::PlugSlotClash(name));
            }
            check_interface_name(&name, &interface)?;
            let apps = slot_bindings
                .get(&name)
                .cloned()
                .unwrap_or_else(|| all_apps.clone());
            slots.insert(
                name.clone(),
                SlotInfo {
                    snap: decl.name.clone(),
                    snap_type: decl.snap_type,
                    name,
                    interface,
                    attrs,
                    apps,
                },
            );
        }

        Ok(Self {
            name: decl.name,
            snap_type: decl.snap_type,
            apps: all_apps,
            plugs,
            slots,
        })
    }

    /// Security tags of every entry point, sorted.
    pub fn security_tags(&self) -> Vec<String> {
        self.apps
            .iter()
            .map(|app| security_tag(&self.name, app))
            .collect()
    }
}

fn check_interface_name(endpoint: &str, interface: &str) -> Result<(), SnapError> {
    if !is_valid_endpoint_name(interface) {
        return Err(SnapError::InvalidInterfaceName {
            endpoint: endpoint.to_owned(),
            interface: interface.to_owned(),
        });
    }
    Ok(())
}

/// Map endpoint name → sorted list of apps that reference it.
fn bindings(
    apps: &BTreeMap<String, AppDeclaration>,
    refs: impl Fn(&AppDeclaration) -> &Vec<String>,
) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (app_name, app) in apps {
        for endpoint in refs(app) {
            let bound = out.entry(endpoint.clone()).or_default();
            if !bound.contains(app_name) {
                bound.push(app_name.clone());
            }
        }
    }
    out
}

/// Top-level endpoints plus implicit ones named only inside apps.
fn collect_endpoints(
    declared: &BTreeMap<String, EndpointDeclaration>,
    bindings: &BTreeMap<String, Vec<String>>,
) -> Vec<(String, String, Attributes)> {
    let mut out: Vec<(String, String, Attributes)> = declared
        .iter()
        .map(|(name, decl)| {
            let interface = decl.interface.clone().unwrap_or_else(|| name.clone());
            (name.clone(), interface, decl.attrs.clone())
        })
        .collect();
    for name in bindings.keys() {
        if !declared.contains_key(name) {
            out.push((name.clone(), name.clone(), Attributes::new()));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Snap declaration as written by a packager.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapDeclaration {
    /// Snap name.
    pub name: String,
    /// Snap type, `app` when omitted.
    #[serde(default, rename = "type")]
    pub snap_type: SnapType,
    /// Free-form version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Entry points by name.
    #[serde(default)]
    pub apps: BTreeMap<String, AppDeclaration>,
    /// Top-level plugs by name.
    #[serde(default)]
    pub plugs: BTreeMap<String, EndpointDeclaration>,
    /// Top-level slots by name.
    #[serde(default)]
    pub slots: BTreeMap<String, EndpointDeclaration>,
}

/// One entry point in a declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppDeclaration {
    /// Command run by the entry point.
    #[serde(default)]
    pub command: Option<String>,
    /// Plugs this entry point is bound to.
    #[serde(default)]
    pub plugs: Vec<String>,
    /// Slots this entry point is bound to.
    #[serde(default)]
    pub slots: Vec<String>,
}

/// A top-level plug or slot declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointDeclaration {
    /// Interface name; defaults to the endpoint name.
    #[serde(default)]
    pub interface: Option<String>,
    /// Every other key is an attribute.
    #[serde(flatten)]
    pub attrs: Attributes,
}
