// ABOUTME: Tarball/symlink version store backend.
// ABOUTME: Versions are extracted upload directories; pointers are sibling symlinks.

use super::{StoreError, VersionStore};
use crate::exec::{Command, Executor, LocalExecutor};
use crate::release::pointer::Pointer;
use crate::release::producer::ArtifactRef;
use crate::types::VersionId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Marker file recording that a pointer change still awaits activation.
const UNACTIVATED_MARKER: &str = ".unactivated";

/// Version store backed by a site directory on the target host.
///
/// Layout: `<site_dir>/<version_id>/` per version, with `staged`,
/// `current`, `previous`, and `rolledback` symlinks as siblings. A staged
/// artifact travels as a gzipped tarball packed on the operator's machine,
/// uploaded over the executor, and extracted in place.
pub struct TarballStore<E> {
    exec: E,
    site_dir: String,
}

impl<E: Executor> TarballStore<E> {
    pub fn new(exec: E, site_dir: impl Into<String>) -> Self {
        Self {
            exec,
            site_dir: site_dir.into(),
        }
    }

    fn entry(&self, name: &str) -> String {
        format!("{}/{}", self.site_dir, name)
    }

    /// Run a command and require exit code 0.
    async fn run_checked(&self, command: Command) -> Result<(), StoreError> {
        let output = self.exec.run(&command).await?;
        if !output.success() {
            return Err(StoreError::command_failure(&command, &output));
        }
        Ok(())
    }

    /// Pack the build directory's contents into a local temporary tarball.
    async fn pack(&self, build_dir: &Path, id: &VersionId) -> Result<PathBuf, StoreError> {
        let tarball = std::env::temp_dir().join(format!("otto-{id}.tar.gz"));
        let command = Command::new(format!(
            "tar -czf \"{}\" -C \"{}\" .",
            tarball.display(),
            build_dir.display()
        ));

        let local = LocalExecutor::new();
        let output = local.run(&command).await.map_err(|e| StoreError::Transfer {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        if !output.success() {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: format!("tar failed: {}", output.failure_text()),
            });
        }
        Ok(tarball)
    }

    /// Upload and unpack, cleaning up the partial version on failure so a
    /// retry starts from nothing.
    async fn transfer(&self, tarball: &Path, id: &VersionId) -> Result<(), StoreError> {
        let remote_tarball = self.entry(&format!("{id}.tar.gz"));
        let version_dir = self.entry(id.as_str());

        if let Err(e) = self.exec.upload(tarball, &remote_tarball).await {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: format!("upload failed: {e}"),
            });
        }

        let extract = Command::new(format!(
            "mkdir \"{version_dir}\" && tar -xzf \"{remote_tarball}\" -C \"{version_dir}\" && rm -f \"{remote_tarball}\""
        ));
        let result = self.exec.run(&extract).await;
        let failed = match &result {
            Ok(output) => !output.success(),
            Err(_) => true,
        };

        if failed {
            // Leave no partial version behind
            let _ = self
                .exec
                .run(&Command::new(format!(
                    "rm -rf \"{version_dir}\" \"{remote_tarball}\""
                )))
                .await;
            let reason = match result {
                Ok(output) => format!("extract failed: {}", output.failure_text()),
                Err(e) => format!("extract failed: {e}"),
            };
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl<E: Executor> VersionStore for TarballStore<E> {
    async fn prepare(&self) -> Result<(), StoreError> {
        self.run_checked(Command::new(format!("mkdir -p \"{}\"", self.site_dir)))
            .await
    }

    async fn register(&self, artifact: &ArtifactRef, id: &VersionId) -> Result<(), StoreError> {
        let build_dir = match artifact {
            ArtifactRef::Directory(path) => path,
            ArtifactRef::Revision(_) => return Err(StoreError::UnsupportedArtifact("revision")),
        };

        let tarball = self.pack(build_dir, id).await?;
        let result = self.transfer(&tarball, id).await;
        let _ = tokio::fs::remove_file(&tarball).await;
        result
    }

    async fn pointer(&self, pointer: Pointer) -> Result<Option<VersionId>, StoreError> {
        let link = self.entry(pointer.link_name());
        let command = Command::new(format!("readlink \"{link}\" 2>/dev/null || true"));
        let output = self.exec.run(&command).await?;

        let value = output.stdout.trim();
        if value.is_empty() {
            return Ok(None);
        }
        VersionId::parse(value)
            .map(Some)
            .map_err(|_| StoreError::CorruptPointer {
                pointer,
                value: value.to_string(),
            })
    }

    async fn set_pointer(&self, pointer: Pointer, id: &VersionId) -> Result<(), StoreError> {
        // Build the new link aside, then rename over the old one. rename(2)
        // replaces atomically, so the pointer never half-exists.
        let staging_link = self.entry(&format!(".{}.new", pointer.link_name()));
        let link = self.entry(pointer.link_name());
        self.run_checked(Command::new(format!(
            "ln -sfn \"{id}\" \"{staging_link}\" && mv -Tf \"{staging_link}\" \"{link}\""
        )))
        .await
    }

    async fn clear_pointer(&self, pointer: Pointer) -> Result<(), StoreError> {
        let link = self.entry(pointer.link_name());
        self.run_checked(Command::new(format!("rm -f \"{link}\""))).await
    }

    async fn versions(&self) -> Result<Vec<VersionId>, StoreError> {
        // Version directories all start with a digit; pointers and markers
        // never do. Non-version entries (in-flight tarballs) parse as
        // invalid ids and are skipped.
        let command = Command::new(format!(
            "cd \"{}\" 2>/dev/null && ls -1d [0-9]* 2>/dev/null; true",
            self.site_dir
        ));
        let output = self.exec.run(&command).await?;

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| VersionId::parse(line.trim()).ok())
            .collect())
    }

    async fn contains(&self, id: &VersionId) -> Result<bool, StoreError> {
        let command = Command::new(format!("test -d \"{}\"", self.entry(id.as_str())));
        let output = self.exec.run(&command).await?;
        Ok(output.success())
    }

    async fn remove(&self, id: &VersionId) -> Result<(), StoreError> {
        self.run_checked(Command::new(format!(
            "rm -rf \"{}\"",
            self.entry(id.as_str())
        )))
        .await
    }

    async fn checkout(&self, _id: &VersionId) -> Result<(), StoreError> {
        // The extracted directory is already the servable tree.
        Ok(())
    }

    async fn set_activation_pending(&self, pending: bool) -> Result<(), StoreError> {
        let marker = self.entry(UNACTIVATED_MARKER);
        let command = if pending {
            Command::new(format!("touch \"{marker}\""))
        } else {
            Command::new(format!("rm -f \"{marker}\""))
        };
        self.run_checked(command).await
    }

    async fn activation_pending(&self) -> Result<bool, StoreError> {
        let marker = self.entry(UNACTIVATED_MARKER);
        let output = self
            .exec
            .run(&Command::new(format!("test -e \"{marker}\"")))
            .await?;
        Ok(output.success())
    }

    fn live_path(&self, id: &VersionId) -> String {
        self.entry(id.as_str())
    }
}
