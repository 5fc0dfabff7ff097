// ABOUTME: Git-tag version store backend.
// ABOUTME: Versions are otto-<id> tags in a server-side clone; pointers are force-moved tags.

use super::{StoreError, VersionStore};
use crate::exec::{Command, Executor};
use crate::release::pointer::Pointer;
use crate::release::producer::ArtifactRef;
use crate::types::VersionId;
use async_trait::async_trait;

/// Version store backed by a working clone on the target host.
///
/// Each registered version is a lightweight tag `otto-<id>` on the staged
/// commit. Pointers are the moving tags `otto-staged`, `otto-current`,
/// `otto-previous`, and `otto-rolledback`, re-applied with force; a forced
/// tag update is a single atomic ref write. Promotion checks the version
/// out (detached) and runs the configured build command.
pub struct GitTagStore<E> {
    exec: E,
    workspace: String,
    repo: String,
    branch: String,
    build: Option<String>,
}

impl<E: Executor> GitTagStore<E> {
    pub fn new(
        exec: E,
        workspace: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        build: Option<String>,
    ) -> Self {
        Self {
            exec,
            workspace: workspace.into(),
            repo: repo.into(),
            branch: branch.into(),
            build,
        }
    }

    fn version_tag(id: &VersionId) -> String {
        format!("otto-{id}")
    }

    /// Marker lives next to the workspace, not inside it, so it never shows
    /// up as a stray file to git.
    fn marker_path(&self) -> String {
        format!("{}.unactivated", self.workspace)
    }

    /// Run a command in the workspace and require exit code 0.
    async fn run_checked(&self, command: Command) -> Result<(), StoreError> {
        let output = self.exec.run(&command).await?;
        if !output.success() {
            return Err(StoreError::command_failure(&command, &output));
        }
        Ok(())
    }

    fn git(&self, line: impl Into<String>) -> Command {
        Command::new(line).cwd(self.workspace.clone())
    }

    /// Refuse to touch a workspace with uncommitted tracked changes, so
    /// what gets tagged is exactly what gets deployed. Untracked files are
    /// tolerated: the build command is allowed to leave artifacts behind.
    async fn ensure_clean(&self) -> Result<(), StoreError> {
        let command = self.git("git status --porcelain --untracked-files=no");
        let output = self.exec.run(&command).await?;
        if !output.success() {
            return Err(StoreError::command_failure(&command, &output));
        }
        let status = output.stdout.trim();
        if !status.is_empty() {
            return Err(StoreError::LocalModification {
                context: format!("server workspace {}", self.workspace),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Executor> VersionStore for GitTagStore<E> {
    async fn prepare(&self) -> Result<(), StoreError> {
        let probe = Command::new(format!("test -d \"{}/.git\"", self.workspace));
        let output = self.exec.run(&probe).await?;
        if output.success() {
            return Ok(());
        }

        self.run_checked(Command::new(format!(
            "mkdir -p \"$(dirname \"{ws}\")\" && git clone -q -b \"{branch}\" \"{repo}\" \"{ws}\"",
            ws = self.workspace,
            branch = self.branch,
            repo = self.repo,
        )))
        .await
    }

    async fn register(&self, artifact: &ArtifactRef, id: &VersionId) -> Result<(), StoreError> {
        let revision = match artifact {
            ArtifactRef::Revision(rev) => rev,
            ArtifactRef::Directory(_) => return Err(StoreError::UnsupportedArtifact("directory")),
        };

        self.ensure_clean().await?;

        // Pick up whatever the operator pushed, including the staging ref
        let fetch = self.git("git fetch -q origin && git fetch -q origin \"+refs/otto/*:refs/otto/*\"");
        let output = self.exec.run(&fetch).await?;
        if !output.success() {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: format!("fetch failed: {}", output.failure_text()),
            });
        }

        let verify = self.git(format!(
            "git rev-parse --verify --quiet \"{revision}^{{commit}}\""
        ));
        let output = self.exec.run(&verify).await?;
        if !output.success() {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: format!("revision {revision} not found after fetch"),
            });
        }
        let sha = output.stdout.trim().to_string();

        let tag = self.git(format!("git tag -f \"{}\" {sha}", Self::version_tag(id)));
        let output = self.exec.run(&tag).await?;
        if !output.success() {
            return Err(StoreError::Transfer {
                id: id.clone(),
                reason: format!("tagging failed: {}", output.failure_text()),
            });
        }
        Ok(())
    }

    async fn pointer(&self, pointer: Pointer) -> Result<Option<VersionId>, StoreError> {
        // A pointer tag names a commit, not a version; recover the version
        // by finding which otto-<id> tags sit on that commit. If several
        // versions share the commit the newest wins.
        let tag = pointer.tag_name();
        let command = self.git(format!(
            "git rev-parse -q --verify \"refs/tags/{tag}\" >/dev/null 2>&1 \
             && git tag -l \"otto-[0-9]*\" --points-at \"refs/tags/{tag}\"; true"
        ));
        let output = self.exec.run(&command).await?;

        let mut newest: Option<VersionId> = None;
        let mut first_raw: Option<String> = None;
        for line in output.stdout.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            first_raw.get_or_insert_with(|| line.to_string());
            if let Some(raw) = line.strip_prefix("otto-")
                && let Ok(id) = VersionId::parse(raw)
            {
                newest = match newest {
                    Some(prev) if prev >= id => Some(prev),
                    _ => Some(id),
                };
            }
        }

        match (newest, first_raw) {
            (Some(id), _) => Ok(Some(id)),
            (None, None) => Ok(None),
            (None, Some(raw)) => Err(StoreError::CorruptPointer {
                pointer,
                value: raw,
            }),
        }
    }

    async fn set_pointer(&self, pointer: Pointer, id: &VersionId) -> Result<(), StoreError> {
        self.run_checked(self.git(format!(
            "git tag -f \"{}\" \"{}\"",
            pointer.tag_name(),
            Self::version_tag(id)
        )))
        .await
    }

    async fn clear_pointer(&self, pointer: Pointer) -> Result<(), StoreError> {
        // Deleting an absent tag is not an error
        self.exec
            .run(&self.git(format!(
                "git tag -d \"{}\" >/dev/null 2>&1; true",
                pointer.tag_name()
            )))
            .await?;
        Ok(())
    }

    async fn versions(&self) -> Result<Vec<VersionId>, StoreError> {
        let command = self.git("git tag -l \"otto-[0-9]*\"");
        let output = self.exec.run(&command).await?;
        if !output.success() {
            return Err(StoreError::command_failure(&command, &output));
        }

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.trim().strip_prefix("otto-"))
            .filter_map(|raw| VersionId::parse(raw).ok())
            .collect())
    }

    async fn contains(&self, id: &VersionId) -> Result<bool, StoreError> {
        let output = self
            .exec
            .run(&self.git(format!(
                "git rev-parse -q --verify \"refs/tags/{}\" >/dev/null",
                Self::version_tag(id)
            )))
            .await?;
        Ok(output.success())
    }

    async fn remove(&self, id: &VersionId) -> Result<(), StoreError> {
        self.run_checked(self.git(format!("git tag -d \"{}\"", Self::version_tag(id))))
            .await
    }

    async fn checkout(&self, id: &VersionId) -> Result<(), StoreError> {
        self.run_checked(self.git(format!("git checkout -qf \"{}\"", Self::version_tag(id))))
            .await?;

        if let Some(build) = &self.build {
            tracing::info!(command = %build, "running build command in workspace");
            self.run_checked(Command::new(build.clone()).cwd(self.workspace.clone()))
                .await?;
        }
        Ok(())
    }

    async fn set_activation_pending(&self, pending: bool) -> Result<(), StoreError> {
        let marker = self.marker_path();
        let command = if pending {
            Command::new(format!("touch \"{marker}\""))
        } else {
            Command::new(format!("rm -f \"{marker}\""))
        };
        self.run_checked(command).await
    }

    async fn activation_pending(&self) -> Result<bool, StoreError> {
        let output = self
            .exec
            .run(&Command::new(format!("test -e \"{}\"", self.marker_path())))
            .await?;
        Ok(output.success())
    }

    fn live_path(&self, _id: &VersionId) -> String {
        // The workspace clone is the servable tree; checkout already
        // switched it to the right version.
        self.workspace.clone()
    }
}
