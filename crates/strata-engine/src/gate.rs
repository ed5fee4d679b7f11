//! Access control seam.

use serde::{Deserialize, Serialize};
use strata_types::Path;

/// What a request wants to do with a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
}

/// Verdict of an [`AccessGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decides whether a principal may touch a path.
///
/// Called by the dispatcher before any state is read or written.
pub trait AccessGate: Send + Sync {
    fn check(&self, principal: Option<&str>, path: &Path, mode: AccessMode) -> Access;
}

/// Allows everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessGate for AllowAll {
    fn check(&self, _principal: Option<&str>, _path: &Path, _mode: AccessMode) -> Access {
        Access::Allow
    }
}

/// Allows reads, denies every write.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl AccessGate for ReadOnly {
    fn check(&self, _principal: Option<&str>, _path: &Path, mode: AccessMode) -> Access {
        match mode {
            AccessMode::Read => Access::Allow,
            AccessMode::Write => Access::Deny,
        }
    }
}
