//! Plugboard: confinement policy composition for sandboxed applications.
//!
//! Applications declare plugs and slots of named capability types. Each
//! capability type contributes rule snippets and mount entries for the
//! connections it takes part in; this crate composes them into the finished
//! per-backend policy of one application.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod release;

pub mod snap;

pub mod interfaces;

pub mod scenario;
