// ABOUTME: Error types for release operations.
// ABOUTME: Operator errors (nothing staged, no history), activation failures, lock conflicts.

use crate::types::VersionId;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::producer::ProduceError;
use super::store::StoreError;

/// Errors from the release state machine.
///
/// Activation failures intentionally do not revert the pointer change that
/// preceded them; the store records the pending state so `list` can show it.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("no staged version to deploy (run `otto stage` first)")]
    NoStagedVersion,

    #[error("no previous deployment to roll back to")]
    NoPreviousVersion,

    #[error(
        "site activation failed for version {id}: {reason}; \
         the version is live but unactivated - retry the deploy or roll back"
    )]
    Activation { id: VersionId, reason: String },

    #[error("release lock held by {holder} (pid {pid}) since {since}; use --force to break it")]
    LockHeld {
        holder: String,
        pid: u32,
        since: DateTime<Utc>,
    },

    #[error("release lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Produce(#[from] ProduceError),
}
