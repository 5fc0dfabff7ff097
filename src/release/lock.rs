// ABOUTME: Advisory release lock to prevent concurrent releases of the same site.
// ABOUTME: Uses atomic file creation with lock info stored in ~/.local/state/otto/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::{Command, Executor};
use crate::types::SiteName;

use super::ReleaseError;

/// Base directory for otto state files (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/otto";

/// Information about who holds a release lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Site being released.
    pub site: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(site: &SiteName) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            site: site.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file for a site.
    /// Uses $HOME for shell expansion compatibility.
    pub fn lock_path(site: &SiteName) -> String {
        format!("$HOME/{}/{}.lock", STATE_DIR, site)
    }
}

/// A held release lock. Explicitly released after the operation; a crash
/// leaves the file behind, to be broken as stale or with --force.
pub struct ReleaseLock<'a, E: Executor> {
    exec: &'a E,
    site: SiteName,
}

impl<E: Executor> std::fmt::Debug for ReleaseLock<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseLock")
            .field("site", &self.site)
            .finish()
    }
}

impl<'a, E: Executor> ReleaseLock<'a, E> {
    /// Acquire the release lock for the given site.
    ///
    /// Uses shell noclobber mode for atomic lock acquisition (no TOCTOU race).
    /// Returns error if lock is already held by another process.
    /// Auto-breaks stale locks (>1 hour) with a warning.
    pub async fn acquire(exec: &'a E, site: &SiteName, force: bool) -> Result<Self, ReleaseError> {
        let lock_path = LockInfo::lock_path(site);

        // Ensure state directory exists
        Self::ensure_state_dir(exec).await?;

        // Prepare lock info
        let lock_info = LockInfo::new(site);
        let lock_json = serde_json::to_string(&lock_info)
            .map_err(|e| ReleaseError::Lock(format!("failed to serialize lock: {}", e)))?;
        let escaped_json = lock_json.replace('\'', "'\\''");

        // Try atomic lock acquisition using noclobber mode
        // set -C makes > fail if file already exists (atomic create-if-not-exists)
        // Use double quotes for path to expand $HOME, single quotes for JSON
        let acquire_cmd = Command::new(format!(
            "(set -C; echo '{}' > \"{}\") 2>/dev/null",
            escaped_json, lock_path
        ));

        let result = exec
            .run(&acquire_cmd)
            .await
            .map_err(|e| ReleaseError::Lock(format!("failed to acquire lock: {}", e)))?;

        if result.success() {
            return Ok(Self {
                exec,
                site: site.clone(),
            });
        }

        // Lock acquisition failed - check if existing lock should be broken
        let should_break = Self::check_existing_lock(exec, &lock_path, force).await?;

        if !should_break {
            // Lock is valid and held by someone else
            let output = exec
                .run(&Command::new(format!("cat \"{}\"", lock_path)))
                .await;
            if let Ok(output) = output
                && let Ok(existing) = serde_json::from_str::<LockInfo>(&output.stdout)
            {
                return Err(ReleaseError::LockHeld {
                    holder: existing.holder,
                    pid: existing.pid,
                    since: existing.started_at,
                });
            }
            return Err(ReleaseError::Lock(
                "lock held by another process".to_string(),
            ));
        }

        // Break the lock and retry
        tracing::debug!("Removing stale/forced lock at {}", lock_path);
        let _ = exec
            .run(&Command::new(format!("rm -f \"{}\"", lock_path)))
            .await;

        // Retry acquisition
        let result = exec
            .run(&acquire_cmd)
            .await
            .map_err(|e| ReleaseError::Lock(format!("failed to acquire lock: {}", e)))?;

        if !result.success() {
            return Err(ReleaseError::Lock(
                "lock acquired by another process during break".to_string(),
            ));
        }

        Ok(Self {
            exec,
            site: site.clone(),
        })
    }

    /// Ensure the state directory exists on the remote server.
    async fn ensure_state_dir(exec: &E) -> Result<(), ReleaseError> {
        let cmd = Command::new(format!("mkdir -p \"$HOME/{}\"", STATE_DIR));
        let output = exec
            .run(&cmd)
            .await
            .map_err(|e| ReleaseError::Lock(format!("failed to create state directory: {}", e)))?;

        if !output.success() {
            return Err(ReleaseError::Lock(format!(
                "failed to create state directory: {}",
                output.stderr
            )));
        }
        Ok(())
    }

    /// Check if an existing lock should be broken (stale, forced, or corrupted).
    async fn check_existing_lock(
        exec: &E,
        lock_path: &str,
        force: bool,
    ) -> Result<bool, ReleaseError> {
        let output = exec
            .run(&Command::new(format!("cat \"{}\"", lock_path)))
            .await
            .map_err(|e| ReleaseError::Lock(format!("failed to read lock info: {}", e)))?;

        if !output.success() {
            // Can't read lock info - corrupted or doesn't exist, break it
            tracing::warn!("Lock info unreadable, breaking lock");
            return Ok(true);
        }

        match serde_json::from_str::<LockInfo>(&output.stdout) {
            Ok(existing_lock) => {
                if force {
                    tracing::warn!(
                        "Breaking lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(true)
                } else if existing_lock.is_stale() {
                    tracing::warn!(
                        "Auto-breaking stale lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(true)
                } else {
                    // Lock is active and valid
                    Ok(false)
                }
            }
            Err(_) => {
                // Lock info corrupted, break it
                tracing::warn!("Lock info corrupted, breaking lock");
                Ok(true)
            }
        }
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), ReleaseError> {
        let lock_path = LockInfo::lock_path(&self.site);
        let _ = self
            .exec
            .run(&Command::new(format!("rm -f \"{}\"", lock_path)))
            .await;
        Ok(())
    }
}
