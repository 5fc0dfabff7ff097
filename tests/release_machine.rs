// ABOUTME: Behavior tests for the release state machine over an in-memory store.
// ABOUTME: Covers pointer rotation, rollback round-trips, retention, and failure modes.

mod support;

use otto::release::{ReleaseError, ReleaseManager, ReleaseState, StoreError};
use support::{MemoryStore, RecordingActivation, StubProducer};

fn manager(
    store: &MemoryStore,
    activation: &RecordingActivation,
) -> ReleaseManager<MemoryStore, RecordingActivation> {
    ReleaseManager::new(store.clone(), activation.clone(), 3)
}

#[tokio::test]
async fn stage_then_deploy_makes_staged_current() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    let staged = manager.stage(&StubProducer::new()).await.unwrap();

    let status = manager.status().await.unwrap();
    assert_eq!(status.staged.as_ref(), Some(&staged));
    assert_eq!(status.state(), ReleaseState::Staged);

    let deployed = manager.deploy().await.unwrap();
    assert_eq!(deployed, staged);

    let status = manager.status().await.unwrap();
    assert_eq!(status.current.as_ref(), Some(&staged));
    assert_eq!(status.staged, None, "staged is cleared after promotion");
    assert_eq!(status.state(), ReleaseState::Live);
    assert_eq!(activation.activated(), vec![staged]);
}

#[tokio::test]
async fn deploy_rotates_current_into_previous() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    let first = manager.deploy().await.unwrap();

    manager.stage(&StubProducer::new()).await.unwrap();
    let second = manager.deploy().await.unwrap();
    assert_ne!(first, second);

    let status = manager.status().await.unwrap();
    assert_eq!(status.current.as_ref(), Some(&second));
    assert_eq!(status.previous.as_ref(), Some(&first));
}

#[tokio::test]
async fn rollback_round_trip_restores_prior_current() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    let a = manager.deploy().await.unwrap();
    manager.stage(&StubProducer::new()).await.unwrap();
    let b = manager.deploy().await.unwrap();

    let restored = manager.rollback(None).await.unwrap();
    assert_eq!(restored, a);

    let status = manager.status().await.unwrap();
    assert_eq!(status.current.as_ref(), Some(&a));
    assert_eq!(status.rolledback.as_ref(), Some(&b));
    // Both versions survive in the store regardless of retention
    let removed = manager.cleanup(Some(0)).await.unwrap();
    assert!(removed.is_empty());
    let status = manager.status().await.unwrap();
    assert!(status.versions.contains(&a));
    assert!(status.versions.contains(&b));
}

#[tokio::test]
async fn rollback_to_explicit_target() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    let a = manager.deploy().await.unwrap();
    manager.stage(&StubProducer::new()).await.unwrap();
    manager.deploy().await.unwrap();
    manager.stage(&StubProducer::new()).await.unwrap();
    let c = manager.deploy().await.unwrap();

    let restored = manager.rollback(Some(&a)).await.unwrap();
    assert_eq!(restored, a);

    let status = manager.status().await.unwrap();
    assert_eq!(status.current.as_ref(), Some(&a));
    assert_eq!(status.rolledback.as_ref(), Some(&c));
}

#[tokio::test]
async fn rollback_to_unknown_target_fails() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    manager.deploy().await.unwrap();

    let ghost = otto::types::VersionId::parse("19990101-000000").unwrap();
    let err = manager.rollback(Some(&ghost)).await.unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::Store(StoreError::NotFound(ref id)) if *id == ghost
    ));
}

#[tokio::test]
async fn deploy_without_stage_fails_and_changes_nothing() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    let err = manager.deploy().await.unwrap_err();
    assert!(matches!(err, ReleaseError::NoStagedVersion));

    let status = manager.status().await.unwrap();
    assert_eq!(status.state(), ReleaseState::Empty);
    assert_eq!(status.current, None);
    assert_eq!(status.previous, None);
    assert!(activation.activated().is_empty());
}

#[tokio::test]
async fn rollback_without_history_fails() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    let err = manager.rollback(None).await.unwrap_err();
    assert!(matches!(err, ReleaseError::NoPreviousVersion));

    // Still fails after a single deploy: there is no previous yet
    manager.stage(&StubProducer::new()).await.unwrap();
    manager.deploy().await.unwrap();
    let err = manager.rollback(None).await.unwrap_err();
    assert!(matches!(err, ReleaseError::NoPreviousVersion));
}

#[tokio::test]
async fn cleanup_spares_pointer_referenced_versions() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    let mut deployed = Vec::new();
    for _ in 0..5 {
        manager.stage(&StubProducer::new()).await.unwrap();
        deployed.push(manager.deploy().await.unwrap());
    }

    // current = v5, previous = v4; with retain=1 only v1..v3 are removable
    let removed = manager.cleanup(Some(1)).await.unwrap();
    assert_eq!(removed.len(), 3);
    for id in &deployed[..3] {
        assert!(removed.contains(id));
    }

    let status = manager.status().await.unwrap();
    assert!(status.versions.contains(&deployed[3]), "previous survives");
    assert!(status.versions.contains(&deployed[4]), "current survives");
}

#[tokio::test]
async fn cleanup_respects_retention_window() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    // Stage five versions without deploying; only the last is referenced
    for _ in 0..5 {
        manager.stage(&StubProducer::new()).await.unwrap();
    }

    // Default retain is 3: the two oldest go
    let removed = manager.cleanup(None).await.unwrap();
    assert_eq!(removed.len(), 2);

    let status = manager.status().await.unwrap();
    assert_eq!(status.versions.len(), 3);
}

#[tokio::test]
async fn failed_transfer_leaves_staged_untouched() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    let staged = manager.stage(&StubProducer::new()).await.unwrap();

    store.fail_next_register();
    let err = manager.stage(&StubProducer::new()).await.unwrap_err();
    assert!(matches!(err, ReleaseError::Store(StoreError::Transfer { .. })));

    let status = manager.status().await.unwrap();
    assert_eq!(
        status.staged.as_ref(),
        Some(&staged),
        "failed transfer must not move the staged pointer"
    );

    // Retry succeeds with a fresh id
    let retried = manager.stage(&StubProducer::new()).await.unwrap();
    assert_ne!(retried, staged);
    let status = manager.status().await.unwrap();
    assert_eq!(status.staged.as_ref(), Some(&retried));
}

#[tokio::test]
async fn activation_failure_keeps_pointer_and_reports_unactivated() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    let a = manager.deploy().await.unwrap();
    manager.stage(&StubProducer::new()).await.unwrap();

    activation.fail_next();
    let err = manager.deploy().await.unwrap_err();
    let ReleaseError::Activation { id, .. } = err else {
        panic!("expected activation error, got {err:?}");
    };

    // The pointer change survives the activation failure
    let status = manager.status().await.unwrap();
    assert_eq!(status.current.as_ref(), Some(&id));
    assert_ne!(id, a);
    assert_eq!(status.state(), ReleaseState::LiveUnactivated);

    // Rolling back re-runs activation and clears the pending state
    let restored = manager.rollback(None).await.unwrap();
    assert_eq!(restored, a);
    let status = manager.status().await.unwrap();
    assert_eq!(status.state(), ReleaseState::RolledBack);
    assert!(!status.activation_pending);
}

#[tokio::test]
async fn promotion_checks_out_and_activates_the_version() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    let id = manager.deploy().await.unwrap();

    assert_eq!(store.checkouts(), vec![id.clone()]);
    assert_eq!(activation.activated(), vec![id]);
}

#[tokio::test]
async fn list_is_idempotent() {
    let store = MemoryStore::new();
    let activation = RecordingActivation::new();
    let manager = manager(&store, &activation);

    manager.stage(&StubProducer::new()).await.unwrap();
    manager.deploy().await.unwrap();
    manager.stage(&StubProducer::new()).await.unwrap();

    let first = manager.status().await.unwrap();
    let second = manager.status().await.unwrap();
    assert_eq!(first, second);
    assert!(first.versions.windows(2).all(|w| w[0] > w[1]), "newest first");
}
