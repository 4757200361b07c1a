//! Principal label expressions used as peer tokens inside generated rules.
//!
//! A [`LabelExpr`] can only be built from validated snap and app names or
//! from the unconfined marker, so its text is always safe to splice into a
//! rule. It is computed once per connection side and handed to the hooks.

use thiserror::Error;

use crate::release::ExecutionEnvironment;
use crate::snap::{validate_app_name, validate_snap_name, Endpoint};

/// Label of processes that run outside any confinement.
pub const UNCONFINED: &str = "unconfined";

/// Errors computing a label expression.
#[derive(Debug, Error)]
pub enum LabelError {
    /// The owning snap name cannot appear in a label.
    #[error("cannot build label for snap {0:?}: invalid snap name")]
    InvalidSnapName(String),
    /// An entry point name cannot appear in a label.
    #[error("cannot build label for snap {snap:?}: invalid app name {app:?}")]
    InvalidAppName {
        /// Owning snap.
        snap: String,
        /// Offending entry point.
        app: String,
    },
}

/// A textual principal expression matching one or more security tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelExpr(String);

impl LabelExpr {
    /// The unconfined marker.
    pub fn unconfined() -> Self {
        Self(UNCONFINED.to_owned())
    }

    /// Expression matching the given entry points of one snap.
    ///
    /// One app yields the plain tag `snap.<snap>.<app>`; several yield the
    /// bounded alternation `snap.<snap>.{a,b}` in sorted order; none yields
    /// `snap.<snap>.*`, which still only matches that snap's own tags.
    ///
    /// # Errors
    ///
    /// Returns [`LabelError`] if any name would not be a literal token.
    pub fn for_apps(snap: &str, apps: &[String]) -> Result<Self, LabelError> {
        validate_snap_name(snap).map_err(|_| LabelError::InvalidSnapName(snap.to_owned()))?;
        for app in apps {
            validate_app_name(app).map_err(|_| LabelError::InvalidAppName {
                snap: snap.to_owned(),
                app: app.clone(),
            })?;
        }

        let mut names: Vec<&str> = apps.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();

        let expr = match names.as_slice() {
            [] => format!("snap.{snap}.*"),
            [one] => format!("snap.{snap}.{one}"),
            many => format!("snap.{snap}.{{{}}}", many.join(",")),
        };
        Ok(Self(expr))
    }

    /// The expression text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unconfined marker.
    pub fn is_unconfined(&self) -> bool {
        self.0 == UNCONFINED
    }
}

impl std::fmt::Display for LabelExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label expression for one side of a connection.
///
/// On a classic host the platform's own endpoints run unconfined, so they
/// collapse to [`UNCONFINED`] whatever their declared owner is.
///
/// # Errors
///
/// Returns [`LabelError`] if the endpoint's names are not valid tokens.
pub fn endpoint_label_expr(
    endpoint: &impl Endpoint,
    env: ExecutionEnvironment,
) -> Result<LabelExpr, LabelError> {
    if env.on_classic() && endpoint.is_platform_owned() {
        return Ok(LabelExpr::unconfined());
    }
    LabelExpr::for_apps(endpoint.snap(), endpoint.apps())
}

/// Computes the plug-side and slot-side expressions for a connection.
///
/// Both sides go through the same rule; they are separate entry points so a
/// pass can compute (or stub) them independently.
#[derive(Debug, Clone, Copy)]
pub struct LabelBuilder {
    env: ExecutionEnvironment,
}

impl LabelBuilder {
    /// Builder for the given environment.
    pub fn new(env: ExecutionEnvironment) -> Self {
        Self { env }
    }

    /// Environment labels are computed for.
    pub fn environment(&self) -> ExecutionEnvironment {
        self.env
    }

    /// Expression naming the plug's bound entry points.
    ///
    /// # Errors
    ///
    /// See [`endpoint_label_expr`].
    pub fn plug_expr(&self, plug: &crate::snap::PlugInfo) -> Result<LabelExpr, LabelError> {
        endpoint_label_expr(plug, self.env)
    }

    /// Expression naming the slot's bound entry points.
    ///
    /// # Errors
    ///
    /// See [`endpoint_label_expr`].
    pub fn slot_expr(&self, slot: &crate::snap::SlotInfo) -> Result<LabelExpr, LabelError> {
        endpoint_label_expr(slot, self.env)
    }
}
