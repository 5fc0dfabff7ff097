// ABOUTME: Remote execution adapter: shell commands against a target host.
// ABOUTME: One trait, two transports - SSH session and local subprocess.

mod local;
mod ssh;

pub use local::LocalExecutor;
pub use ssh::SshExecutor;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// A shell command to run on the target, with optional working directory
/// and privilege escalation.
#[derive(Debug, Clone)]
pub struct Command {
    line: String,
    cwd: Option<String>,
    privileged: bool,
}

impl Command {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            cwd: None,
            privileged: false,
        }
    }

    pub fn cwd(mut self, dir: impl Into<String>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Render the full shell line, applying cwd and sudo wrapping.
    ///
    /// Privileged lines are wrapped in `sudo sh -c '...'` so pipelines and
    /// compound commands escalate as a whole, not just their first word.
    pub fn shell_line(&self) -> String {
        let base = if self.privileged {
            format!("sudo sh -c '{}'", self.line.replace('\'', "'\\''"))
        } else {
            self.line.clone()
        };
        match &self.cwd {
            Some(dir) => format!("cd \"{}\" && {}", dir, base),
            None => base,
        }
    }
}

/// Output from one command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The most useful failure text: stderr if any, else stdout.
    pub fn failure_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Transport-level errors. A command that runs and exits non-zero is not an
/// error here; callers inspect `CommandOutput::success`.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run local command: {0}")]
    Local(String),
}

/// Capability to run shell commands and place files on a target.
///
/// The release machinery depends only on this trait, never on a specific
/// transport, so the same state machine drives an SSH session in production
/// and a local subprocess in tests.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a command to completion and collect its output.
    async fn run(&self, command: &Command) -> Result<CommandOutput, ExecError>;

    /// Copy a local file to a path on the target. The remote parent
    /// directory must already exist.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), ExecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command_renders_verbatim() {
        let cmd = Command::new("ls -1");
        assert_eq!(cmd.shell_line(), "ls -1");
    }

    #[test]
    fn cwd_prefixes_a_quoted_cd() {
        let cmd = Command::new("git status").cwd("/srv/otto/workspace/example.com");
        assert_eq!(
            cmd.shell_line(),
            "cd \"/srv/otto/workspace/example.com\" && git status"
        );
    }

    #[test]
    fn privileged_wraps_in_sudo_shell() {
        let cmd = Command::new("service apache2 reload").privileged();
        assert_eq!(cmd.shell_line(), "sudo sh -c 'service apache2 reload'");
    }

    #[test]
    fn privileged_escapes_single_quotes() {
        let cmd = Command::new("echo 'hi'").privileged();
        assert_eq!(cmd.shell_line(), "sudo sh -c 'echo '\\''hi'\\'''");
    }

    #[test]
    fn failure_text_prefers_stderr() {
        let out = CommandOutput {
            exit_code: 1,
            stdout: "partial\n".to_string(),
            stderr: "boom\n".to_string(),
        };
        assert_eq!(out.failure_text(), "boom");

        let out = CommandOutput {
            exit_code: 1,
            stdout: "only stdout\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.failure_text(), "only stdout");
    }
}
