//! Application resource installation and restart.

use super::{AppInstaller, Transport};
use crate::update::backup::BackupManager;
use crate::update::manifest::RemoteManifest;
use anyhow::{Context, Result, bail};
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// File name of the application resource bundle under the app root.
pub const RESOURCES_FILE: &str = "resources.neu";

/// Swaps in the published resource bundle and restarts the executable.
///
/// The swap uses the same move-aside protocol as command binaries: the current bundle is
/// moved to `resources.neu.bak`, the new one written, and the backup restored if anything
/// fails. No digest is published for the bundle, so there is no integrity step.
pub struct ResourceInstaller {
    transport: Arc<dyn Transport>,
    app_root: PathBuf,
    restart_args: Vec<String>,
}

impl ResourceInstaller {
    pub fn new(transport: Arc<dyn Transport>, app_root: PathBuf) -> Self {
        Self {
            transport,
            app_root,
            restart_args: std::env::args().skip(1).collect(),
        }
    }

    /// Arguments the restarted process is launched with. Defaults to the current ones.
    #[must_use]
    pub fn with_restart_args(mut self, args: Vec<String>) -> Self {
        self.restart_args = args;
        self
    }

    #[must_use]
    pub fn resources_path(&self) -> PathBuf {
        self.app_root.join(RESOURCES_FILE)
    }

    async fn replace(&self, url: &str) -> Result<()> {
        let bytes = self.transport.get_bytes(url).await?;

        let target = self.resources_path();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))
    }
}

impl AppInstaller for ResourceInstaller {
    fn install<'a>(&'a self, manifest: &'a RemoteManifest) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if manifest.resources_url.is_empty() {
                bail!("Manifest for version {} has no resources URL", manifest.version);
            }

            let target = self.resources_path();
            let backup = BackupManager::new(target.clone());
            let has_backup = target.exists();
            if has_backup {
                backup.create_backup().await?;
            }

            match self.replace(&manifest.resources_url).await {
                Ok(()) => {
                    if has_backup && let Err(e) = backup.cleanup_backup().await {
                        warn!("Failed to remove resource backup: {:#}", e);
                    }
                    info!("Installed resources for OsmFlux {}", manifest.version);
                    Ok(())
                }
                Err(e) => {
                    if has_backup {
                        backup
                            .restore_backup()
                            .await
                            .context("Failed to restore previous resources")?;
                    } else {
                        crate::utils::fs::remove_file_if_exists(&target).await.ok();
                    }
                    Err(e.context(format!("Failed to install resources from {}", manifest.resources_url)))
                }
            }
        })
    }

    fn restart(&self) -> Result<()> {
        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        info!("Restarting {}", exe.display());

        std::process::Command::new(&exe)
            .args(&self.restart_args)
            .spawn()
            .with_context(|| format!("Failed to start {}", exe.display()))?;

        std::process::exit(0);
    }
}
