//! Auxiliary tools shipped as zip archives.
//!
//! Some tools are not single executables (the clipping tool is a Java distribution with
//! a launcher script and jar files). They are installed by unpacking an archive into the
//! command directory whenever their entry point is missing.

use crate::core::OsmfluxError;
use crate::host::{ExecutableMarker, Transport};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One archive-distributed tool.
///
/// ```toml
/// [[bundles]]
/// name = "osmosis"
/// url = "https://static.mogita.com/osmflux/bundles/osmosis.zip"
/// entry = "osmosis/bin/osmosis"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub name: String,
    /// Archive download URL.
    pub url: String,
    /// Entry point relative to the command directory; its presence means installed.
    pub entry: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    AlreadyPresent,
    Installed,
}

pub struct BundleInstaller {
    transport: Arc<dyn Transport>,
    marker: Arc<dyn ExecutableMarker>,
    commands_dir: PathBuf,
}

impl BundleInstaller {
    pub fn new(
        transport: Arc<dyn Transport>,
        marker: Arc<dyn ExecutableMarker>,
        commands_dir: PathBuf,
    ) -> Self {
        Self {
            transport,
            marker,
            commands_dir,
        }
    }

    /// Install `bundle` unless its entry point already exists.
    pub async fn ensure(&self, bundle: &BundleConfig) -> Result<BundleStatus, OsmfluxError> {
        let entry = self.commands_dir.join(&bundle.entry);
        if entry.exists() {
            debug!("Bundle '{}' present at {}", bundle.name, entry.display());
            return Ok(BundleStatus::AlreadyPresent);
        }

        info!("Installing bundle '{}' from {}", bundle.name, bundle.url);
        if let Err(reason) = self.install(bundle, &entry).await {
            // Without the entry point the next cycle reinstalls the bundle
            if let Err(e) = crate::utils::fs::remove_file_if_exists(&entry).await {
                warn!("Failed to remove incomplete entry {}: {}", entry.display(), e);
            }
            return Err(OsmfluxError::BundleFailed {
                name: bundle.name.clone(),
                reason,
            });
        }

        info!("Installed bundle '{}'", bundle.name);
        Ok(BundleStatus::Installed)
    }

    async fn install(&self, bundle: &BundleConfig, entry: &Path) -> Result<(), String> {
        let archive = self.transport.get_bytes(&bundle.url).await.map_err(|e| format!("{e:#}"))?;

        let dest = self.commands_dir.clone();
        let extracted = tokio::task::spawn_blocking(move || extract_archive(archive, &dest))
            .await
            .map_err(|e| format!("extraction task failed: {e}"))?
            .map_err(|failures| failures.join("; "))?;
        debug!("Extracted {} file(s) for bundle '{}'", extracted, bundle.name);

        if !entry.is_file() {
            return Err(format!("archive did not contain {}", bundle.entry.display()));
        }

        if !crate::utils::platform::is_windows() {
            self.marker
                .mark_executable(entry)
                .await
                .map_err(|e| format!("could not make entry executable: {e}"))?;
        }
        Ok(())
    }
}

/// Unpack every entry of a zip archive into `dest`, in archive order.
///
/// All entries are attempted; the failures are returned together. Entries whose names
/// would escape `dest` are rejected.
fn extract_archive(bytes: Vec<u8>, dest: &Path) -> Result<usize, Vec<String>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| vec![format!("invalid archive: {e}")])?;

    let mut failures = Vec::new();
    let mut written = 0;

    for index in 0..archive.len() {
        let mut file = match archive.by_index(index) {
            Ok(file) => file,
            Err(e) => {
                failures.push(format!("entry #{index}: {e}"));
                continue;
            }
        };

        let Some(relative) = file.enclosed_name() else {
            failures.push(format!("{}: path escapes the target directory", file.name()));
            continue;
        };
        let target = dest.join(relative);

        if file.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&target) {
                failures.push(format!("{}: {e}", target.display()));
            }
            continue;
        }

        let result = target
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::File::create(&target))
            .and_then(|mut out| std::io::copy(&mut file, &mut out).map(|_| ()));

        if let Err(e) = result {
            warn!("Failed to extract {}: {}", target.display(), e);
            failures.push(format!("{}: {e}", target.display()));
            continue;
        }

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) =
                std::fs::set_permissions(&target, std::fs::Permissions::from_mode(mode & 0o7777))
            {
                failures.push(format!("{}: {e}", target.display()));
                continue;
            }
        }

        written += 1;
    }

    if failures.is_empty() { Ok(written) } else { Err(failures) }
}
