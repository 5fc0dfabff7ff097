// ABOUTME: Executor backed by an established SSH session.
// ABOUTME: Thin adapter from the Executor trait onto ssh::Session.

use super::{Command, CommandOutput, ExecError, Executor};
use crate::ssh::Session;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Runs commands on the target host over an SSH session.
///
/// Cheap to clone; all clones share the underlying session, so the store,
/// the activation step, and the release lock can each hold one.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    session: Arc<Session>,
}

impl SshExecutor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn run(&self, command: &Command) -> Result<CommandOutput, ExecError> {
        let line = command.shell_line();
        tracing::debug!(command = %line, "running remote command");
        Ok(self.session.exec(&line).await?)
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), ExecError> {
        tracing::debug!(local = %local.display(), remote, "uploading file");
        Ok(self.session.upload(local, remote).await?)
    }
}
