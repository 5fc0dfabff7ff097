// ABOUTME: The pointer table model: named references into the version store.
// ABOUTME: Snapshot type plus derivation of the overall release state.

use crate::types::VersionId;
use serde::Serialize;
use std::fmt;

/// A named deployment role pointing at one version (or unset).
///
/// On the tarball backend each pointer is a symlink in the site directory;
/// on the git backend it is a force-moved tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pointer {
    Staged,
    Current,
    Previous,
    RolledBack,
}

impl Pointer {
    pub const ALL: [Pointer; 4] = [
        Pointer::Staged,
        Pointer::Current,
        Pointer::Previous,
        Pointer::RolledBack,
    ];

    /// Symlink name in the site directory.
    pub fn link_name(self) -> &'static str {
        match self {
            Pointer::Staged => "staged",
            Pointer::Current => "current",
            Pointer::Previous => "previous",
            Pointer::RolledBack => "rolledback",
        }
    }

    /// Moving tag name in the git backend.
    pub fn tag_name(self) -> &'static str {
        match self {
            Pointer::Staged => "otto-staged",
            Pointer::Current => "otto-deployed",
            Pointer::Previous => "otto-previous",
            Pointer::RolledBack => "otto-rolledback",
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.link_name())
    }
}

/// Overall state of the pointer table, derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseState {
    /// Nothing staged or deployed yet.
    Empty,
    /// A version is staged, nothing is live.
    Staged,
    /// A version is live and activated.
    Live,
    /// The current pointer moved but site activation has not succeeded.
    LiveUnactivated,
    /// A rollback is in effect.
    RolledBack,
}

impl fmt::Display for ReleaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseState::Empty => "EMPTY",
            ReleaseState::Staged => "STAGED",
            ReleaseState::Live => "LIVE",
            ReleaseState::LiveUnactivated => "LIVE_UNACTIVATED",
            ReleaseState::RolledBack => "ROLLED_BACK",
        };
        write!(f, "{s}")
    }
}

/// Read-only snapshot of the pointer table and version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseStatus {
    pub staged: Option<VersionId>,
    pub current: Option<VersionId>,
    pub previous: Option<VersionId>,
    pub rolledback: Option<VersionId>,
    /// Set when a pointer change has not been followed by a successful
    /// site activation.
    pub activation_pending: bool,
    /// All versions in the store, newest first.
    pub versions: Vec<VersionId>,
}

impl ReleaseStatus {
    pub fn pointer(&self, pointer: Pointer) -> Option<&VersionId> {
        match pointer {
            Pointer::Staged => self.staged.as_ref(),
            Pointer::Current => self.current.as_ref(),
            Pointer::Previous => self.previous.as_ref(),
            Pointer::RolledBack => self.rolledback.as_ref(),
        }
    }

    /// Versions referenced by any pointer; these survive cleanup
    /// unconditionally.
    pub fn referenced(&self) -> Vec<&VersionId> {
        Pointer::ALL
            .iter()
            .filter_map(|p| self.pointer(*p))
            .collect()
    }

    /// Derive the overall state. An unactivated current version dominates,
    /// then rollback, then live, then staged.
    pub fn state(&self) -> ReleaseState {
        if self.current.is_some() && self.activation_pending {
            ReleaseState::LiveUnactivated
        } else if self.rolledback.is_some() {
            ReleaseState::RolledBack
        } else if self.current.is_some() {
            ReleaseState::Live
        } else if self.staged.is_some() {
            ReleaseState::Staged
        } else {
            ReleaseState::Empty
        }
    }
}
