use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Moves an installed binary aside before replacement and puts it back on failure.
///
/// The backup lives next to the original with a `.bak` suffix
/// (`commands/osmconvert` ⇒ `commands/osmconvert.bak`), so it stays on the same file
/// system and both moves are plain renames.
///
/// # Examples
///
/// ```rust,no_run
/// use osmflux::update::backup::BackupManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let backup = BackupManager::new(PathBuf::from("commands/osmconvert"));
/// backup.create_backup().await?;
///
/// // ... write the replacement ...
/// let replacement_ok = false;
///
/// if replacement_ok {
///     backup.cleanup_backup().await?;
/// } else {
///     backup.restore_backup().await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupManager {
    /// Path to the installed file.
    original_path: PathBuf,
    /// Path where the backup is kept during the swap.
    backup_path: PathBuf,
}

impl BackupManager {
    /// Create a manager for `original_path`; the backup path is `<original>.bak`.
    pub fn new(original_path: PathBuf) -> Self {
        let mut backup_path = original_path.clone();
        backup_path.set_file_name(format!(
            "{}.bak",
            original_path.file_name().unwrap_or_default().to_string_lossy()
        ));

        Self {
            original_path,
            backup_path,
        }
    }

    /// Move the original file to the backup location.
    ///
    /// A stale backup left by an interrupted earlier run is replaced.
    ///
    /// # Errors
    ///
    /// Fails if the original does not exist or the rename fails. The original is left
    /// untouched in that case.
    pub async fn create_backup(&self) -> Result<()> {
        if !self.original_path.exists() {
            bail!("Original file does not exist: {}", self.original_path.display());
        }

        if self.backup_path.exists() {
            debug!("Removing stale backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.context("Failed to remove stale backup")?;
        }

        debug!("Moving {} to {}", self.original_path.display(), self.backup_path.display());
        fs::rename(&self.original_path, &self.backup_path)
            .await
            .context("Failed to move original aside")?;

        Ok(())
    }

    /// Put the backup back under the original name, discarding whatever is there.
    ///
    /// Retries a few times because on Windows the partially written file can still be
    /// held open by an antivirus scanner or indexer.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_path.exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from backup", self.original_path.display());

        let mut attempts = 0;
        const MAX_ATTEMPTS: u32 = 3;

        while attempts < MAX_ATTEMPTS {
            match self.attempt_restore().await {
                Ok(()) => {
                    info!("Restored {}", self.original_path.display());
                    return Ok(());
                }
                Err(e) if attempts < MAX_ATTEMPTS - 1 => {
                    warn!("Restore attempt {} failed: {}. Retrying...", attempts + 1, e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
                    attempts += 1;
                }
                Err(e) => return Err(e),
            }
        }

        bail!("Failed to restore backup after {MAX_ATTEMPTS} attempts")
    }

    async fn attempt_restore(&self) -> Result<()> {
        crate::utils::fs::remove_file_if_exists(&self.original_path)
            .await
            .context("Failed to remove partially written file")?;

        fs::rename(&self.backup_path, &self.original_path)
            .await
            .context("Failed to move backup into place")?;

        Ok(())
    }

    /// Delete the backup after a successful swap. Missing backups are fine.
    pub async fn cleanup_backup(&self) -> Result<()> {
        if self.backup_path.exists() {
            debug!("Cleaning up backup at {}", self.backup_path.display());
            fs::remove_file(&self.backup_path).await.context("Failed to remove backup")?;
        }
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn original_path(&self) -> &Path {
        &self.original_path
    }
}
