//! Scenario documents: a set of snaps plus their active connections.
//!
//! This is the offline stand-in for the connection-management surface. A
//! scenario is a TOML file:
//!
//! ```toml
//! [[snaps]]
//! name = "client"
//! [snaps.apps.app]
//! plugs = ["portal-access"]
//!
//! [[connections]]
//! plug = "client:portal-access"
//! slot = "xdg-desktop-portal:portal-access"
//! ```
//!
//! Loading sanitizes every snap against a registry, so connections are only
//! ever built from sanitized endpoints.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::interfaces::policy::{auto_connections, evaluate_auto_connect};
use crate::interfaces::{
    AutoConnectDecision, Composer, Connection, GenerationReport, Registry, SanitizeError, Sanitized,
};
use crate::release::ExecutionEnvironment;
use crate::snap::{Attributes, PlugInfo, SlotInfo, SnapDeclaration, SnapError, SnapInfo};

/// Errors raised while loading a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The file could not be read.
    #[error("failed to read scenario at {path}: {source}")]
    Io {
        /// Scenario path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The document is not valid TOML or has the wrong shape.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
    /// A snap declaration is invalid.
    #[error(transparent)]
    Snap(#[from] SnapError),
    /// A snap's endpoints were rejected by their capability types.
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    /// Two snaps share a name.
    #[error("snap {0:?} is declared twice")]
    DuplicateSnap(String),
    /// An endpoint reference is not of the form `snap:name`.
    #[error("malformed endpoint reference {0:?}, expected \"snap:name\"")]
    MalformedRef(String),
    /// A reference names a snap that is not declared.
    #[error("unknown snap {0:?}")]
    UnknownSnap(String),
    /// A reference names a plug its snap does not declare.
    #[error("snap {snap:?} has no plug {plug:?}")]
    UnknownPlug {
        /// Snap name.
        snap: String,
        /// Plug name.
        plug: String,
    },
    /// A reference names a slot its snap does not declare.
    #[error("snap {snap:?} has no slot {slot:?}")]
    UnknownSlot {
        /// Snap name.
        snap: String,
        /// Slot name.
        slot: String,
    },
    /// The two endpoints of a declared connection differ in interface.
    #[error("cannot connect {plug} ({plug_interface:?}) to {slot} ({slot_interface:?})")]
    InterfaceMismatch {
        /// `snap:name` of the plug.
        plug: String,
        /// The plug's interface.
        plug_interface: String,
        /// `snap:name` of the slot.
        slot: String,
        /// The slot's interface.
        slot_interface: String,
    },
}

/// Raw scenario document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioDocument {
    /// Installed snaps.
    #[serde(default)]
    pub snaps: Vec<SnapDeclaration>,
    /// Active connections.
    #[serde(default)]
    pub connections: Vec<ConnectionDeclaration>,
}

/// One declared connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionDeclaration {
    /// Plug reference, `snap:plug`.
    pub plug: String,
    /// Slot reference, `snap:slot`.
    pub slot: String,
    /// Dynamic plug-side attributes.
    #[serde(default)]
    pub plug_attrs: Attributes,
    /// Dynamic slot-side attributes.
    #[serde(default)]
    pub slot_attrs: Attributes,
}

/// Sanitized snaps and the connections between them.
#[derive(Debug, Clone)]
pub struct Scenario {
    snaps: IndexMap<String, Sanitized<SnapInfo>>,
    connections: Vec<Connection>,
}

impl Scenario {
    /// Read and load a scenario file.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Io`] if the file cannot be read, or any
    /// error of [`Scenario::parse`].
    pub fn load(path: &Path, registry: &Registry) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, registry)
    }

    /// Parse and load a scenario document.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] if the document does not parse, a snap is
    /// invalid or fails sanitization, or a connection cannot be resolved.
    pub fn parse(contents: &str, registry: &Registry) -> Result<Self, ScenarioError> {
        let doc: ScenarioDocument = toml::from_str(contents)?;
        Self::from_document(doc, registry)
    }

    /// Load a parsed document.
    ///
    /// # Errors
    ///
    /// See [`Scenario::parse`].
    pub fn from_document(doc: ScenarioDocument, registry: &Registry) -> Result<Self, ScenarioError> {
        let mut snaps = IndexMap::new();
        for decl in doc.snaps {
            let info = SnapInfo::from_declaration(decl)?;
            if snaps.contains_key(&info.name) {
                return Err(ScenarioError::DuplicateSnap(info.name));
            }
            let sanitized = registry.sanitize_snap(info)?;
            snaps.insert(sanitized.name.clone(), sanitized);
        }

        let mut scenario = Self {
            snaps,
            connections: Vec::new(),
        };
        for decl in doc.connections {
            let conn = scenario.resolve_connection(decl)?;
            debug!(connection = %conn.conn_ref(), interface = conn.interface(), "connection loaded");
            scenario.connections.push(conn);
        }
        info!(
            snaps = scenario.snaps.len(),
            connections = scenario.connections.len(),
            "scenario loaded"
        );
        Ok(scenario)
    }

    fn resolve_connection(&self, decl: ConnectionDeclaration) -> Result<Connection, ScenarioError> {
        let (plug_snap, plug_name) = split_ref(&decl.plug)?;
        let (slot_snap, slot_name) = split_ref(&decl.slot)?;

        let plug = self
            .require_snap(plug_snap)?
            .plug(plug_name)
            .ok_or_else(|| ScenarioError::UnknownPlug {
                snap: plug_snap.to_owned(),
                plug: plug_name.to_owned(),
            })?;
        let slot = self
            .require_snap(slot_snap)?
            .slot(slot_name)
            .ok_or_else(|| ScenarioError::UnknownSlot {
                snap: slot_snap.to_owned(),
                slot: slot_name.to_owned(),
            })?;

        // User input, so a mismatch is reported rather than left to the
        // constructor's invariant check.
        if plug.interface != slot.interface {
            return Err(ScenarioError::InterfaceMismatch {
                plug: decl.plug,
                plug_interface: plug.interface.clone(),
                slot: decl.slot,
                slot_interface: slot.interface.clone(),
            });
        }

        Ok(Connection::new(&plug, &slot).with_dynamic_attrs(decl.plug_attrs, decl.slot_attrs))
    }

    fn require_snap(&self, name: &str) -> Result<&Sanitized<SnapInfo>, ScenarioError> {
        self.snaps
            .get(name)
            .ok_or_else(|| ScenarioError::UnknownSnap(name.to_owned()))
    }

    /// A snap by name.
    pub fn snap(&self, name: &str) -> Option<&Sanitized<SnapInfo>> {
        self.snaps.get(name)
    }

    /// Every snap in declaration order.
    pub fn snaps(&self) -> impl Iterator<Item = &Sanitized<SnapInfo>> {
        self.snaps.values()
    }

    /// Every declared connection.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections with at least one endpoint in `snap`.
    pub fn connections_for(&self, snap: &str) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.involves(snap))
            .cloned()
            .collect()
    }

    /// Every plug of every snap.
    pub fn plugs(&self) -> Vec<Sanitized<PlugInfo>> {
        self.snaps.values().flat_map(|s| s.plugs()).collect()
    }

    /// Every slot of every snap.
    pub fn slots(&self) -> Vec<Sanitized<SlotInfo>> {
        self.snaps.values().flat_map(|s| s.slots()).collect()
    }

    /// Connections the snap's plugs would get at install time without
    /// consent, against every slot in the scenario.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownSnap`] if `snap` is not declared.
    pub fn install_connections(
        &self,
        registry: &Registry,
        env: ExecutionEnvironment,
        snap: &str,
    ) -> Result<Vec<Connection>, ScenarioError> {
        let plugs = self.require_snap(snap)?.plugs();
        let slots = self.slots();
        Ok(auto_connections(registry, env, &plugs, &slots))
    }

    /// Evaluate auto-connect for `plugs` against `slots`.
    pub fn auto_connect_decisions<'a>(
        registry: &Registry,
        env: ExecutionEnvironment,
        plugs: &'a [Sanitized<PlugInfo>],
        slots: &'a [Sanitized<SlotInfo>],
    ) -> Vec<AutoConnectDecision<'a>> {
        evaluate_auto_connect(registry, env, plugs, slots)
    }

    /// Run a generation pass for `snap` over its declared connections.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownSnap`] if `snap` is not declared.
    /// Hook failures are reported per backend inside the report.
    pub fn generate(
        &self,
        registry: &Registry,
        env: ExecutionEnvironment,
        snap: &str,
    ) -> Result<GenerationReport, ScenarioError> {
        let info = self.require_snap(snap)?;
        let connections = self.connections_for(snap);
        Ok(Composer::new(registry, env).compose(info, &connections))
    }
}

fn split_ref(reference: &str) -> Result<(&str, &str), ScenarioError> {
    match reference.split_once(':') {
        Some((snap, name)) if !snap.is_empty() && !name.is_empty() => Ok((snap, name)),
        _ => Err(ScenarioError::MalformedRef(reference.to_owned())),
    }
}
