//! Execution environment detection.
//!
//! The environment is a process-wide, read-only fact: either every
//! application (including the platform's own providers) runs confined, or
//! the host is a classic distribution where platform services run
//! unconfined. It only ever changes how peer labels are computed.

use std::path::Path;

use tracing::debug;

/// Default location of the os-release file.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// os-release `ID` of the fully-sandboxed distribution.
const ALL_SNAP_ID: &str = "ubuntu-core";

/// The kind of host generated policy will be enforced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionEnvironment {
    /// Fully-sandboxed host: platform providers are confined too.
    AllSnap,
    /// Classic host: platform providers run unconfined.
    Classic,
}

impl ExecutionEnvironment {
    /// Whether this is a classic (loosely-confined) host.
    pub fn on_classic(self) -> bool {
        matches!(self, Self::Classic)
    }

    /// Classify the host from the contents of an os-release file.
    ///
    /// Only `ID=ubuntu-core` is treated as fully sandboxed; anything else,
    /// including a missing `ID`, is classic.
    pub fn from_os_release(contents: &str) -> Self {
        let id = contents.lines().find_map(|line| {
            let value = line.trim().strip_prefix("ID=")?;
            Some(value.trim_matches(|c| c == '"' || c == '\''))
        });
        match id {
            Some(ALL_SNAP_ID) => Self::AllSnap,
            _ => Self::Classic,
        }
    }

    /// Detect the environment by reading an os-release file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read. A missing
    /// file is treated as classic.
    pub fn detect(os_release: &Path) -> std::io::Result<Self> {
        match std::fs::read_to_string(os_release) {
            Ok(contents) => {
                let env = Self::from_os_release(&contents);
                debug!(path = %os_release.display(), environment = %env, "execution environment detected");
                Ok(env)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %os_release.display(), "no os-release file, assuming classic");
                Ok(Self::Classic)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllSnap => f.write_str("all-snap"),
            Self::Classic => f.write_str("classic"),
        }
    }
}
