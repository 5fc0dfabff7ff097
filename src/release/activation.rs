// ABOUTME: Site activation: host-level side effects after a version goes live.
// ABOUTME: Links the version's etc/ tree into /etc and reloads the HTTP server.

use crate::exec::{Command, ExecError, Executor};
use crate::types::VersionId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("command `{command}` failed: {detail}")]
    Command { command: String, detail: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Installs a promoted version's host-level configuration effects.
///
/// Must be idempotent: `deploy` and `rollback` re-invoke it freely, and an
/// operator retries it after a partial failure.
#[async_trait]
pub trait SiteActivation: Send + Sync {
    async fn activate(&self, id: &VersionId, live_root: &str) -> Result<(), ActivationError>;
}

/// Activation for sites with no host-level side effects.
pub struct NoopActivation;

#[async_trait]
impl SiteActivation for NoopActivation {
    async fn activate(&self, _id: &VersionId, _live_root: &str) -> Result<(), ActivationError> {
        Ok(())
    }
}

/// Activation that mirrors the version's `etc/` subtree into the host's
/// `/etc`.
///
/// Every file under `<live_root>/etc/**` gets a symlink at the matching
/// absolute path, created with privilege. Created links are recorded in a
/// ledger file so later runs can see what this tool owns; entries whose
/// target no longer exists are trimmed on each activation. Finally the
/// configured HTTP server is reloaded.
pub struct EtcActivation<E> {
    exec: E,
    ledger: String,
    service: Option<String>,
}

impl<E: Executor> EtcActivation<E> {
    pub fn new(exec: E, ledger: impl Into<String>, service: Option<String>) -> Self {
        Self {
            exec,
            ledger: ledger.into(),
            service,
        }
    }

    async fn run_checked(&self, command: Command) -> Result<(), ActivationError> {
        let output = self.exec.run(&command).await?;
        if !output.success() {
            return Err(ActivationError::Command {
                command: command.line().to_string(),
                detail: format!("exit code {}: {}", output.exit_code, output.failure_text()),
            });
        }
        Ok(())
    }

    /// List files under the version's etc/ subtree, as paths relative to
    /// the live root ("etc/apache2/sites-available/example.com", ...).
    async fn etc_entries(&self, live_root: &str) -> Result<Vec<String>, ActivationError> {
        let command = Command::new(format!(
            "find \"{live_root}/etc\" -type f 2>/dev/null; true"
        ));
        let output = self.exec.run(&command).await?;

        let prefix = format!("{live_root}/");
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.trim().strip_prefix(&prefix))
            .map(|rel| rel.to_string())
            .collect())
    }

    async fn install_links(
        &self,
        live_root: &str,
        entries: &[String],
    ) -> Result<(), ActivationError> {
        for rel in entries {
            let source = format!("{live_root}/{rel}");
            let target = format!("/{rel}");
            let target_dir = match target.rsplit_once('/') {
                Some((dir, _)) if !dir.is_empty() => dir.to_string(),
                _ => "/".to_string(),
            };
            self.run_checked(
                Command::new(format!(
                    "mkdir -p \"{target_dir}\" && ln -sfn \"{source}\" \"{target}\""
                ))
                .privileged(),
            )
            .await?;
        }
        Ok(())
    }

    /// Append newly created links to the ledger, then drop entries whose
    /// target has disappeared. Best-effort, like the links listing itself.
    async fn update_ledger(&self, entries: &[String]) -> Result<(), ActivationError> {
        if !entries.is_empty() {
            let args: Vec<String> = entries
                .iter()
                .map(|rel| format!("'{}'", rel.replace('\'', "'\\''")))
                .collect();
            self.run_checked(Command::new(format!(
                "printf '%s\\n' {} >> \"{}\"",
                args.join(" "),
                self.ledger
            )))
            .await?;
        }

        let trim = Command::new(format!(
            "if [ -f \"{ledger}\" ]; then \
               sort -u \"{ledger}\" > \"{ledger}.tmp\"; : > \"{ledger}\"; \
               while IFS= read -r f; do \
                 [ -e \"/$f\" ] && printf '%s\\n' \"$f\" >> \"{ledger}\"; \
               done < \"{ledger}.tmp\"; rm -f \"{ledger}.tmp\"; \
             fi; true",
            ledger = self.ledger
        ));
        let _ = self.exec.run(&trim).await?;
        Ok(())
    }
}

#[async_trait]
impl<E: Executor> SiteActivation for EtcActivation<E> {
    async fn activate(&self, id: &VersionId, live_root: &str) -> Result<(), ActivationError> {
        let entries = self.etc_entries(live_root).await?;
        if entries.is_empty() {
            tracing::debug!(version = %id, "no etc/ entries to install");
        } else {
            tracing::info!(version = %id, count = entries.len(), "installing etc links");
            self.install_links(live_root, &entries).await?;
            self.update_ledger(&entries).await?;
        }

        if let Some(service) = &self.service {
            self.run_checked(Command::new(format!("service \"{service}\" reload")).privileged())
                .await?;
        }
        Ok(())
    }
}
