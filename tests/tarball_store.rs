// ABOUTME: Integration tests for the tarball/symlink backend against a temp directory.
// ABOUTME: Real tar, symlinks, and renames via LocalExecutor; no remote host needed.

mod support;

use otto::exec::LocalExecutor;
use otto::release::{
    DirProducer, NoopActivation, ReleaseManager, ReleaseState, TarballStore, VersionStore,
};
use otto::types::VersionId;
use std::fs;
use std::path::PathBuf;
use support::RecordingActivation;
use tempfile::TempDir;

struct SiteFixture {
    _root: TempDir,
    site_dir: PathBuf,
    build: TempDir,
}

impl SiteFixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let site_dir = root.path().join("example.com");
        let build = TempDir::new().unwrap();
        Self {
            _root: root,
            site_dir,
            build,
        }
    }

    fn write_build(&self, content: &str) {
        fs::write(self.build.path().join("index.html"), content).unwrap();
    }

    fn store(&self) -> TarballStore<LocalExecutor> {
        TarballStore::new(LocalExecutor::new(), self.site_dir.display().to_string())
    }

    fn producer(&self) -> DirProducer {
        DirProducer::new(self.build.path())
    }

    fn link_target(&self, name: &str) -> Option<String> {
        fs::read_link(self.site_dir.join(name))
            .ok()
            .map(|p| p.display().to_string())
    }

    fn version_file(&self, id: &VersionId, name: &str) -> PathBuf {
        self.site_dir.join(id.as_str()).join(name)
    }
}

#[tokio::test]
async fn stage_extracts_content_and_links_staged() {
    let fixture = SiteFixture::new();
    fixture.write_build("hello v1");
    let manager = ReleaseManager::new(fixture.store(), NoopActivation, 3);

    let id = manager.stage(&fixture.producer()).await.unwrap();

    assert_eq!(fixture.link_target("staged").as_deref(), Some(id.as_str()));
    let content = fs::read_to_string(fixture.version_file(&id, "index.html")).unwrap();
    assert_eq!(content, "hello v1");

    // No leftover tarball in the site directory
    assert!(!fixture.site_dir.join(format!("{id}.tar.gz")).exists());
}

#[tokio::test]
async fn full_release_cycle_with_real_symlinks() {
    let fixture = SiteFixture::new();
    let manager = ReleaseManager::new(fixture.store(), NoopActivation, 3);

    // First release
    fixture.write_build("v1");
    let v1 = manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();

    assert_eq!(fixture.link_target("current").as_deref(), Some(v1.as_str()));
    assert_eq!(fixture.link_target("staged"), None, "staged link is removed");

    // Second release rotates previous
    fixture.write_build("v2");
    let v2 = manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();

    assert_eq!(fixture.link_target("current").as_deref(), Some(v2.as_str()));
    assert_eq!(fixture.link_target("previous").as_deref(), Some(v1.as_str()));

    // Rollback restores v1 and remembers v2
    let restored = manager.rollback(None).await.unwrap();
    assert_eq!(restored, v1);
    assert_eq!(fixture.link_target("current").as_deref(), Some(v1.as_str()));
    assert_eq!(
        fixture.link_target("rolledback").as_deref(),
        Some(v2.as_str())
    );

    // The live tree serves the rolled-back content
    let content = fs::read_to_string(fixture.version_file(&v1, "index.html")).unwrap();
    assert_eq!(content, "v1");

    // Both versions survive an aggressive cleanup because pointers
    // reference them
    let removed = manager.cleanup(Some(0)).await.unwrap();
    assert!(removed.is_empty());
    assert!(fixture.site_dir.join(v1.as_str()).is_dir());
    assert!(fixture.site_dir.join(v2.as_str()).is_dir());
}

#[tokio::test]
async fn deploy_after_rollback_clears_the_rollback_marker() {
    let fixture = SiteFixture::new();
    let manager = ReleaseManager::new(fixture.store(), NoopActivation, 3);

    fixture.write_build("v1");
    manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();
    fixture.write_build("v2");
    manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();
    manager.rollback(None).await.unwrap();

    fixture.write_build("v3");
    manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();

    let status = manager.status().await.unwrap();
    assert_eq!(status.state(), ReleaseState::Live);
    assert_eq!(fixture.link_target("rolledback"), None);
}

#[tokio::test]
async fn cleanup_removes_only_unreferenced_versions() {
    let fixture = SiteFixture::new();
    let manager = ReleaseManager::new(fixture.store(), NoopActivation, 3);

    let mut ids = Vec::new();
    for n in 0..4 {
        fixture.write_build(&format!("v{n}"));
        ids.push(manager.stage(&fixture.producer()).await.unwrap());
        manager.deploy().await.unwrap();
    }

    // current = ids[3], previous = ids[2]
    let removed = manager.cleanup(Some(1)).await.unwrap();
    assert_eq!(removed, vec![ids[1].clone(), ids[0].clone()]);
    assert!(!fixture.site_dir.join(ids[0].as_str()).exists());
    assert!(!fixture.site_dir.join(ids[1].as_str()).exists());
    assert!(fixture.site_dir.join(ids[2].as_str()).is_dir());
    assert!(fixture.site_dir.join(ids[3].as_str()).is_dir());
}

#[tokio::test]
async fn status_lists_versions_newest_first() {
    let fixture = SiteFixture::new();
    let manager = ReleaseManager::new(fixture.store(), NoopActivation, 3);

    fixture.write_build("a");
    let first = manager.stage(&fixture.producer()).await.unwrap();
    fixture.write_build("b");
    let second = manager.stage(&fixture.producer()).await.unwrap();

    let status = manager.status().await.unwrap();
    assert_eq!(status.versions, vec![second.clone(), first]);
    // Only the latest stage is still pointed at
    assert_eq!(status.staged, Some(second));
}

#[tokio::test]
async fn activation_failure_leaves_marker_file() {
    let fixture = SiteFixture::new();
    let activation = RecordingActivation::new();
    let manager = ReleaseManager::new(fixture.store(), activation.clone(), 3);

    fixture.write_build("v1");
    manager.stage(&fixture.producer()).await.unwrap();

    activation.fail_next();
    assert!(manager.deploy().await.is_err());

    assert!(fixture.site_dir.join(".unactivated").exists());
    let status = manager.status().await.unwrap();
    assert_eq!(status.state(), ReleaseState::LiveUnactivated);

    // A later successful promotion clears the marker
    fixture.write_build("v2");
    manager.stage(&fixture.producer()).await.unwrap();
    manager.deploy().await.unwrap();
    assert!(!fixture.site_dir.join(".unactivated").exists());
    assert_eq!(
        manager.status().await.unwrap().state(),
        ReleaseState::Live
    );
}

#[tokio::test]
async fn pointer_reads_survive_an_empty_site_dir() {
    let fixture = SiteFixture::new();
    let store = fixture.store();

    // Nothing prepared yet: reads must report absence, not failure
    assert_eq!(
        store.pointer(otto::release::Pointer::Current).await.unwrap(),
        None
    );
    assert!(store.versions().await.unwrap().is_empty());
    assert!(!store.activation_pending().await.unwrap());
}
