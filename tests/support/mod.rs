// ABOUTME: Shared test doubles for release state machine tests.
// ABOUTME: In-memory version store, stub producer, and recording activation.

#![allow(dead_code)]

use async_trait::async_trait;
use otto::release::store::{StoreError, VersionStore};
use otto::release::{
    ActivationError, ArtifactRef, BuildProducer, Pointer, ProduceError, SiteActivation,
};
use otto::types::VersionId;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct MemoryState {
    versions: BTreeSet<VersionId>,
    pointers: HashMap<Pointer, VersionId>,
    pending: bool,
    checkouts: Vec<VersionId>,
}

/// In-memory version store. Clones share state, so tests can keep a handle
/// while the manager owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_register: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next register call fail with a transfer error.
    pub fn fail_next_register(&self) {
        self.fail_next_register.store(true, Ordering::SeqCst);
    }

    /// Versions the backend promotion hook was asked to check out.
    pub fn checkouts(&self) -> Vec<VersionId> {
        self.state.lock().unwrap().checkouts.clone()
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn prepare(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn register(&self, _artifact: &ArtifactRef, id: &VersionId) -> Result<(), StoreError> {
        if self.fail_next_register.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: "induced transfer failure".to_string(),
            });
        }
        self.state.lock().unwrap().versions.insert(id.clone());
        Ok(())
    }

    async fn pointer(&self, pointer: Pointer) -> Result<Option<VersionId>, StoreError> {
        Ok(self.state.lock().unwrap().pointers.get(&pointer).cloned())
    }

    async fn set_pointer(&self, pointer: Pointer, id: &VersionId) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .pointers
            .insert(pointer, id.clone());
        Ok(())
    }

    async fn clear_pointer(&self, pointer: Pointer) -> Result<(), StoreError> {
        self.state.lock().unwrap().pointers.remove(&pointer);
        Ok(())
    }

    async fn versions(&self) -> Result<Vec<VersionId>, StoreError> {
        Ok(self.state.lock().unwrap().versions.iter().cloned().collect())
    }

    async fn contains(&self, id: &VersionId) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().versions.contains(id))
    }

    async fn remove(&self, id: &VersionId) -> Result<(), StoreError> {
        self.state.lock().unwrap().versions.remove(id);
        Ok(())
    }

    async fn checkout(&self, id: &VersionId) -> Result<(), StoreError> {
        self.state.lock().unwrap().checkouts.push(id.clone());
        Ok(())
    }

    async fn set_activation_pending(&self, pending: bool) -> Result<(), StoreError> {
        self.state.lock().unwrap().pending = pending;
        Ok(())
    }

    async fn activation_pending(&self) -> Result<bool, StoreError> {
        Ok(self.state.lock().unwrap().pending)
    }

    fn live_path(&self, id: &VersionId) -> String {
        format!("/memory/{id}")
    }
}

/// Producer that hands back a fixed artifact reference.
pub struct StubProducer {
    artifact: ArtifactRef,
}

impl StubProducer {
    pub fn new() -> Self {
        Self {
            artifact: ArtifactRef::Directory(PathBuf::from("build")),
        }
    }
}

impl Default for StubProducer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildProducer for StubProducer {
    async fn produce(&self) -> Result<ArtifactRef, ProduceError> {
        Ok(self.artifact.clone())
    }
}

/// Activation double that records what it activated and can be told to fail.
#[derive(Clone, Default)]
pub struct RecordingActivation {
    activated: Arc<Mutex<Vec<VersionId>>>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingActivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn activated(&self) -> Vec<VersionId> {
        self.activated.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteActivation for RecordingActivation {
    async fn activate(&self, id: &VersionId, _live_root: &str) -> Result<(), ActivationError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ActivationError::Command {
                command: "activate".to_string(),
                detail: "induced activation failure".to_string(),
            });
        }
        self.activated.lock().unwrap().push(id.clone());
        Ok(())
    }
}
