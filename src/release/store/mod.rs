// ABOUTME: The version store abstraction: append-only artifact history plus pointers.
// ABOUTME: Two backends behind one trait - tarball/symlink and git tag.

mod git;
mod tarball;

pub use git::GitTagStore;
pub use tarball::TarballStore;

use crate::exec::{Command, CommandOutput, ExecError};
use crate::release::pointer::Pointer;
use crate::types::VersionId;
use async_trait::async_trait;
use thiserror::Error;

use super::producer::ArtifactRef;

/// Errors from version store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Artifact upload/registration failed. Retryable: the staged pointer
    /// is untouched and a retry mints a fresh version id.
    #[error("artifact transfer failed for version {id}: {reason}")]
    Transfer { id: VersionId, reason: String },

    #[error("version {0} not found in the store")]
    NotFound(VersionId),

    /// The git backend refuses to operate on a dirty working tree so what
    /// is tagged never drifts from what is deployed.
    #[error("{context} has local modifications; commit or stash them first:\n{status}")]
    LocalModification { context: String, status: String },

    /// A pointer resolved to something that is not a version id.
    #[error("pointer {pointer} is corrupt: resolves to {value:?}")]
    CorruptPointer { pointer: Pointer, value: String },

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error("this backend does not accept a {0} artifact")]
    UnsupportedArtifact(&'static str),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl StoreError {
    /// Build a `Command` failure from a completed-but-unsuccessful output.
    pub(crate) fn command_failure(command: &Command, output: &CommandOutput) -> Self {
        StoreError::Command {
            command: command.line().to_string(),
            detail: format!(
                "exit code {}: {}",
                output.exit_code,
                output.failure_text()
            ),
        }
    }
}

/// Append-only, content-addressable history of released versions on one
/// target host, plus the pointer table over it.
///
/// Both backends honor the same contract so the release manager stays
/// backend-agnostic:
/// - `register` either fully records the artifact under the new id or
///   fails without touching any pointer;
/// - `set_pointer` is an atomic last-writer-wins replace - there is never
///   a window where the pointer exists but dangles;
/// - `remove` deletes exactly one version and nothing else.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Create the on-host layout (site directory, workspace clone) if missing.
    async fn prepare(&self) -> Result<(), StoreError>;

    /// Transfer the artifact into the store under `id`.
    async fn register(&self, artifact: &ArtifactRef, id: &VersionId) -> Result<(), StoreError>;

    /// Resolve a pointer, or None if unset.
    async fn pointer(&self, pointer: Pointer) -> Result<Option<VersionId>, StoreError>;

    /// Atomically repoint `pointer` at `id`.
    async fn set_pointer(&self, pointer: Pointer, id: &VersionId) -> Result<(), StoreError>;

    /// Unset a pointer. Unset pointers are not an error.
    async fn clear_pointer(&self, pointer: Pointer) -> Result<(), StoreError>;

    /// All version ids in the store, in no particular order.
    async fn versions(&self) -> Result<Vec<VersionId>, StoreError>;

    /// Whether `id` exists in the store.
    async fn contains(&self, id: &VersionId) -> Result<bool, StoreError>;

    /// Delete one version's artifact data.
    async fn remove(&self, id: &VersionId) -> Result<(), StoreError>;

    /// Backend promotion hook, run after the current pointer moves.
    /// The git backend checks out the version and runs the build command;
    /// the tarball backend has nothing to do.
    async fn checkout(&self, id: &VersionId) -> Result<(), StoreError>;

    /// Record or clear the activation-pending marker.
    async fn set_activation_pending(&self, pending: bool) -> Result<(), StoreError>;

    /// Whether a pointer change is still awaiting successful activation.
    async fn activation_pending(&self) -> Result<bool, StoreError>;

    /// On-host path of a version's file tree, for site activation.
    fn live_path(&self, id: &VersionId) -> String;
}
