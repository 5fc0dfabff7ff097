// ABOUTME: Executor backed by a local subprocess shell.
// ABOUTME: Runs operator-side steps (tar, git push) and drives tests.

use super::{Command, CommandOutput, ExecError, Executor};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;

/// Runs commands through `sh -c` on the operator's machine.
///
/// Used for the local half of a release (packing the tarball, pushing the
/// revision) and as the "remote" side in integration tests, where a temp
/// directory stands in for the target host.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn run(&self, command: &Command) -> Result<CommandOutput, ExecError> {
        let line = command.shell_line();
        tracing::debug!(command = %line, "running local command");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&line)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ExecError::Local(format!("spawning `sh -c {line}`: {e}")))?;

        let exit_code = output.status.code().unwrap_or(-1) as u32;
        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), ExecError> {
        tokio::fs::copy(local, remote).await?;
        Ok(())
    }
}
