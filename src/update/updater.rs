use crate::core::OsmfluxError;
use crate::host::{ExecutableMarker, Transport};
use crate::update::backup::BackupManager;
use crate::update::hasher::ContentHasher;
use crate::update::planner::UpdatePlanItem;
use crate::utils::platform::PlatformKey;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Transactionally replaces one command binary.
///
/// # Protocol
///
/// ```text
/// 1. previous digest known ──> move <path> to <path>.bak      (fail: BackupFailed, stop)
/// 2. download new bytes                                      (fail: DownloadFailed)
/// 3. write bytes to <path>                                   (fail: Io)
/// 4. digest(<path>) == expected digest                       (fail: IntegrityMismatch)
/// 5. chmod +x <path>, non-windows only                       (fail: PermissionFixFailed)
/// 6. success ──> delete <path>.bak
///    failure ──> backup: move <path>.bak back over <path>
///                fresh install: delete the partial <path>
///                (either step failing: RollbackFailed)
/// ```
///
/// When a backup existed, a failed `apply` leaves the original file under its original
/// name. Nothing is retried within a cycle; the next check will plan the item again.
pub struct BinaryUpdater {
    transport: Arc<dyn Transport>,
    marker: Arc<dyn ExecutableMarker>,
    fix_permissions: bool,
}

impl BinaryUpdater {
    pub fn new(
        transport: Arc<dyn Transport>,
        marker: Arc<dyn ExecutableMarker>,
        platform: &PlatformKey,
    ) -> Self {
        Self {
            transport,
            marker,
            fix_permissions: !platform.is_windows(),
        }
    }

    /// Apply one plan item. Independent of every other item.
    pub async fn apply(&self, item: &UpdatePlanItem) -> Result<(), OsmfluxError> {
        let backup = BackupManager::new(item.local_path.clone());

        let has_backup = if item.previous_digest.is_some() {
            backup.create_backup().await.map_err(|e| OsmfluxError::BackupFailed {
                command: item.command.clone(),
                reason: format!("{e:#}"),
            })?;
            true
        } else {
            false
        };

        match self.replace(item).await {
            Ok(()) => {
                if has_backup && let Err(e) = backup.cleanup_backup().await {
                    warn!("Updated '{}' but could not remove backup: {:#}", item.command, e);
                }
                info!("Updated '{}' to {}", item.command, item.expected_digest);
                Ok(())
            }
            Err(cause) => Err(self.roll_back(item, &backup, has_backup, cause).await),
        }
    }

    async fn replace(&self, item: &UpdatePlanItem) -> Result<(), OsmfluxError> {
        debug!("Downloading '{}' from {}", item.command, item.download_url);
        let bytes = self.transport.get_bytes(&item.download_url).await.map_err(|e| {
            OsmfluxError::DownloadFailed {
                command: item.command.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        if let Some(parent) = item.local_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| OsmfluxError::io("creating", parent, &e))?;
        }

        fs::write(&item.local_path, &bytes)
            .await
            .map_err(|e| OsmfluxError::io("writing", &item.local_path, &e))?;

        let actual =
            ContentHasher::digest_file(item.expected_digest.algorithm(), &item.local_path).await?;
        if actual != item.expected_digest {
            return Err(OsmfluxError::IntegrityMismatch {
                command: item.command.clone(),
                expected: item.expected_digest.to_string(),
                actual: actual.to_string(),
            });
        }

        if self.fix_permissions {
            self.marker.mark_executable(&item.local_path).await.map_err(|e| {
                OsmfluxError::PermissionFixFailed {
                    command: item.command.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        Ok(())
    }

    async fn roll_back(
        &self,
        item: &UpdatePlanItem,
        backup: &BackupManager,
        has_backup: bool,
        cause: OsmfluxError,
    ) -> OsmfluxError {
        warn!("Updating '{}' failed: {}", item.command, cause);

        let restored = if has_backup {
            backup.restore_backup().await.map_err(|e| format!("{e:#}"))
        } else {
            crate::utils::fs::remove_file_if_exists(&item.local_path)
                .await
                .map_err(|e| format!("could not delete partial file: {e}"))
        };

        match restored {
            Ok(()) => cause,
            Err(reason) => {
                error!(
                    "Rollback of '{}' failed, {} may be missing or corrupt: {}",
                    item.command,
                    item.local_path.display(),
                    reason
                );
                OsmfluxError::RollbackFailed {
                    command: item.command.clone(),
                    cause: cause.to_string(),
                    reason,
                }
            }
        }
    }
}
