// ABOUTME: Build producers: turn operator-side state into a stageable artifact.
// ABOUTME: A local build directory, or a pushed git revision.

use crate::exec::{Command, ExecError, Executor, LocalExecutor};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Reference to a fully-built artifact, ready to register in a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRef {
    /// A local directory tree (tarball backend).
    Directory(PathBuf),
    /// A resolved commit sha, pushed where the target can fetch it
    /// (git backend).
    Revision(String),
}

#[derive(Debug, Error)]
pub enum ProduceError {
    #[error("build directory not found: {0} (run your build first)")]
    MissingBuildDir(PathBuf),

    #[error("build directory is empty: {0}")]
    EmptyBuildDir(PathBuf),

    #[error("local working tree has modifications; commit or stash them before staging:\n{0}")]
    LocalModification(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces the artifact a `stage` operation registers.
#[async_trait]
pub trait BuildProducer: Send + Sync {
    async fn produce(&self) -> Result<ArtifactRef, ProduceError>;
}

/// Producer for the tarball backend: the configured build directory,
/// assembled by whatever build tooling the site uses.
pub struct DirProducer {
    build_dir: PathBuf,
}

impl DirProducer {
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }
}

#[async_trait]
impl BuildProducer for DirProducer {
    async fn produce(&self) -> Result<ArtifactRef, ProduceError> {
        let meta = tokio::fs::metadata(&self.build_dir)
            .await
            .map_err(|_| ProduceError::MissingBuildDir(self.build_dir.clone()))?;
        if !meta.is_dir() {
            return Err(ProduceError::MissingBuildDir(self.build_dir.clone()));
        }

        let mut entries = tokio::fs::read_dir(&self.build_dir).await?;
        if entries.next_entry().await?.is_none() {
            return Err(ProduceError::EmptyBuildDir(self.build_dir.clone()));
        }

        Ok(ArtifactRef::Directory(self.build_dir.clone()))
    }
}

/// Producer for the git backend: resolves a local revision and pushes it
/// to origin (the repository the target host clones from) under a staging
/// ref, so the server-side workspace can fetch it by sha.
pub struct RevisionProducer {
    revision: String,
}

/// Where staged revisions land on origin. Forced, since every stage
/// replaces the last one.
const STAGING_REF: &str = "refs/otto/staging";

impl RevisionProducer {
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
        }
    }

    async fn run(
        &self,
        local: &LocalExecutor,
        command: Command,
    ) -> Result<crate::exec::CommandOutput, ProduceError> {
        Ok(local.run(&command).await?)
    }
}

#[async_trait]
impl BuildProducer for RevisionProducer {
    async fn produce(&self) -> Result<ArtifactRef, ProduceError> {
        let local = LocalExecutor::new();

        // Refuse to stage over uncommitted work: the tag must describe
        // exactly what ships.
        let status = Command::new("git status --porcelain --untracked-files=no");
        let output = self.run(&local, status.clone()).await?;
        if !output.success() {
            return Err(ProduceError::Command {
                command: status.line().to_string(),
                detail: output.failure_text().to_string(),
            });
        }
        if !output.stdout.trim().is_empty() {
            return Err(ProduceError::LocalModification(
                output.stdout.trim().to_string(),
            ));
        }

        let resolve = Command::new(format!(
            "git rev-parse --verify --quiet \"{}^{{commit}}\"",
            self.revision
        ));
        let output = self.run(&local, resolve).await?;
        if !output.success() {
            return Err(ProduceError::RevisionNotFound(self.revision.clone()));
        }
        let sha = output.stdout.trim().to_string();

        let push = Command::new(format!("git push -f -q origin \"{sha}:{STAGING_REF}\""));
        let output = self.run(&local, push.clone()).await?;
        if !output.success() {
            return Err(ProduceError::Command {
                command: push.line().to_string(),
                detail: output.failure_text().to_string(),
            });
        }

        Ok(ArtifactRef::Revision(sha))
    }
}
