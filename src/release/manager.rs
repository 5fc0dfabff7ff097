// ABOUTME: The release state machine: stage, deploy, rollback, cleanup, list.
// ABOUTME: Backend-agnostic; drives a VersionStore and a SiteActivation.

use std::collections::HashSet;

use crate::types::VersionId;

use super::activation::SiteActivation;
use super::error::ReleaseError;
use super::pointer::{Pointer, ReleaseStatus};
use super::producer::BuildProducer;
use super::store::{StoreError, VersionStore};

/// Orchestrates releases against one target host.
///
/// Every mutating operation orders its steps strictly: artifact transfer
/// completes before any pointer moves, and the pointer moves before site
/// activation runs. A step that fails aborts the operation and leaves the
/// pointer table in the state the last completed step produced; `list`
/// always shows that state truthfully.
pub struct ReleaseManager<S, A> {
    store: S,
    activation: A,
    retain: usize,
}

impl<S: VersionStore, A: SiteActivation> ReleaseManager<S, A> {
    pub fn new(store: S, activation: A, retain: usize) -> Self {
        Self {
            store,
            activation,
            retain,
        }
    }

    /// Register a freshly-built artifact and repoint `staged` at it.
    ///
    /// A failed transfer leaves every pointer untouched; retrying stages
    /// again under a fresh version id.
    pub async fn stage(&self, producer: &dyn BuildProducer) -> Result<VersionId, ReleaseError> {
        self.store.prepare().await?;

        let artifact = producer.produce().await?;
        let id = VersionId::now();
        tracing::info!(version = %id, "registering artifact");
        self.store.register(&artifact, &id).await?;
        self.store.set_pointer(Pointer::Staged, &id).await?;
        tracing::info!(version = %id, "staged");
        Ok(id)
    }

    /// Promote the staged version to live.
    ///
    /// Rotates `current` into `previous` (when they differ), repoints
    /// `current`, clears `staged`, then checks out and activates. The
    /// pointer change is never reverted on activation failure; the store
    /// keeps the activation-pending flag so `list` reports
    /// LIVE_UNACTIVATED until a later activation succeeds.
    pub async fn deploy(&self) -> Result<VersionId, ReleaseError> {
        let staged = self
            .store
            .pointer(Pointer::Staged)
            .await?
            .ok_or(ReleaseError::NoStagedVersion)?;

        let current = self.store.pointer(Pointer::Current).await?;
        if let Some(current) = current
            && current != staged
        {
            self.store.set_pointer(Pointer::Previous, &current).await?;
        }

        self.store.set_pointer(Pointer::Current, &staged).await?;
        self.store.clear_pointer(Pointer::Staged).await?;
        // A fresh deploy supersedes any rollback still on record
        self.store.clear_pointer(Pointer::RolledBack).await?;
        tracing::info!(version = %staged, "promoted to current");

        self.promote(&staged).await?;
        Ok(staged)
    }

    /// Restore `current` from `previous`, or from an explicit target.
    ///
    /// The displaced version is remembered in `rolledback` for forensic
    /// inspection until the next cleanup.
    pub async fn rollback(
        &self,
        target: Option<&VersionId>,
    ) -> Result<VersionId, ReleaseError> {
        let target = match target {
            Some(target) => {
                if !self.store.contains(target).await? {
                    return Err(StoreError::NotFound(target.clone()).into());
                }
                target.clone()
            }
            None => self
                .store
                .pointer(Pointer::Previous)
                .await?
                .ok_or(ReleaseError::NoPreviousVersion)?,
        };

        if let Some(current) = self.store.pointer(Pointer::Current).await? {
            self.store
                .set_pointer(Pointer::RolledBack, &current)
                .await?;
        }

        self.store.set_pointer(Pointer::Current, &target).await?;
        tracing::info!(version = %target, "rolled back to");

        self.promote(&target).await?;
        Ok(target)
    }

    /// Shared tail of deploy and rollback: backend checkout, then site
    /// activation, with the pending flag raised across the whole window.
    async fn promote(&self, id: &VersionId) -> Result<(), ReleaseError> {
        self.store.set_activation_pending(true).await?;
        self.store.checkout(id).await?;

        match self.activation.activate(id, &self.store.live_path(id)).await {
            Ok(()) => {
                self.store.set_activation_pending(false).await?;
                tracing::info!(version = %id, "activated");
                Ok(())
            }
            Err(e) => Err(ReleaseError::Activation {
                id: id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Remove versions that are neither pointer-referenced nor among the
    /// most recent `retain` (default from construction). Returns what was
    /// removed, oldest last.
    pub async fn cleanup(&self, retain: Option<usize>) -> Result<Vec<VersionId>, ReleaseError> {
        let retain = retain.unwrap_or(self.retain);
        let status = self.status().await?;

        let mut keep: HashSet<&VersionId> = status.referenced().into_iter().collect();
        keep.extend(status.versions.iter().take(retain));

        let mut removed = Vec::new();
        for id in &status.versions {
            if keep.contains(id) {
                continue;
            }
            tracing::info!(version = %id, "removing");
            self.store.remove(id).await?;
            removed.push(id.clone());
        }
        Ok(removed)
    }

    /// Read-only snapshot of pointers and history, newest version first.
    pub async fn status(&self) -> Result<ReleaseStatus, ReleaseError> {
        let staged = self.store.pointer(Pointer::Staged).await?;
        let current = self.store.pointer(Pointer::Current).await?;
        let previous = self.store.pointer(Pointer::Previous).await?;
        let rolledback = self.store.pointer(Pointer::RolledBack).await?;
        let activation_pending = self.store.activation_pending().await?;

        let mut versions = self.store.versions().await?;
        versions.sort();
        versions.reverse();

        Ok(ReleaseStatus {
            staged,
            current,
            previous,
            rolledback,
            activation_pending,
            versions,
        })
    }
}
