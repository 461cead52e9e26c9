//! Local command inventory.
//!
//! Production installs keep one flat file per command:
//!
//! ```text
//! commands/
//! ├── glancet
//! ├── osmconvert
//! └── osmfilter
//! ```
//!
//! Development checkouts keep every platform variant in a nested tree and get a flat
//! staging copy under `dev-only/`, rebuilt on every listing, so the planner and updater
//! see the same layout in both modes:
//!
//! ```text
//! commands/
//! ├── osmfilter/linux/x64/osmfilter
//! ├── osmfilter/windows/x64/osmfilter.exe
//! └── dev-only/osmfilter          <- staged copy for the host platform
//! ```

use crate::core::OsmfluxError;
use crate::update::hasher::ContentDigest;
use crate::utils::platform::PlatformKey;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Name of the staging directory used in development mode.
pub const DEV_STAGING_DIR: &str = "dev-only";

/// How the command directory is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMode {
    /// Flat directory, one file per command.
    #[default]
    Production,
    /// Nested `<name>/<os>/<arch>/<name>` tree staged into `dev-only/`.
    Development,
}

/// One managed executable found locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    /// Logical command name (no `.exe`).
    pub name: String,
    /// Absolute path of the installed file.
    pub local_path: PathBuf,
    /// Digest of the installed file, attached by the planner.
    pub local_digest: Option<ContentDigest>,
}

/// Enumerates the command executables of one installation.
#[derive(Debug, Clone)]
pub struct CommandInventory {
    commands_dir: PathBuf,
    mode: InstallMode,
    platform: PlatformKey,
}

impl CommandInventory {
    pub fn new(commands_dir: PathBuf, mode: InstallMode, platform: PlatformKey) -> Self {
        Self {
            commands_dir,
            mode,
            platform,
        }
    }

    #[must_use]
    pub fn commands_dir(&self) -> &Path {
        &self.commands_dir
    }

    #[must_use]
    pub const fn mode(&self) -> InstallMode {
        self.mode
    }

    #[must_use]
    pub const fn platform(&self) -> &PlatformKey {
        &self.platform
    }

    /// Directory holding the flat per-command files the updater works on.
    #[must_use]
    pub fn managed_dir(&self) -> PathBuf {
        match self.mode {
            InstallMode::Production => self.commands_dir.clone(),
            InstallMode::Development => self.commands_dir.join(DEV_STAGING_DIR),
        }
    }

    /// Where the updater installs `command`.
    #[must_use]
    pub fn installed_path(&self, command: &str) -> PathBuf {
        self.managed_dir().join(self.platform.executable_name(command))
    }

    /// Path of the executable to run for `command`.
    ///
    /// In development mode this is the source tree, not the staging copy.
    #[must_use]
    pub fn command_path(&self, command: &str) -> PathBuf {
        match self.mode {
            InstallMode::Production => self.installed_path(command),
            InstallMode::Development => self.source_path(command),
        }
    }

    fn source_path(&self, command: &str) -> PathBuf {
        let variant_dir = self
            .commands_dir
            .join(command)
            .join(self.platform.os.as_str())
            .join(self.platform.arch.as_str());

        let executable = variant_dir.join(self.platform.executable_name(command));
        if executable.exists() {
            executable
        } else {
            variant_dir.join(command)
        }
    }

    /// List the installed commands keyed by logical name.
    ///
    /// A missing command directory yields an empty map. In development mode the staging
    /// directory is rebuilt first.
    pub async fn list(&self) -> Result<BTreeMap<String, CommandRecord>, OsmfluxError> {
        if self.mode == InstallMode::Development {
            self.stage_development().await?;
        }

        self.scan(&self.managed_dir()).await
    }

    async fn scan(&self, dir: &Path) -> Result<BTreeMap<String, CommandRecord>, OsmfluxError> {
        let mut records = BTreeMap::new();

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Command directory {} does not exist", dir.display());
                return Ok(records);
            }
            Err(e) => return Err(OsmfluxError::io("listing", dir, &e)),
        };

        while let Some(entry) =
            entries.next_entry().await.map_err(|e| OsmfluxError::io("listing", dir, &e))?
        {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();

            if is_transient(&file_name) {
                continue;
            }

            let is_file = fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let name = self.platform.command_name(&file_name).to_string();
            records.insert(
                name.clone(),
                CommandRecord {
                    name,
                    local_path: path,
                    local_digest: None,
                },
            );
        }

        debug!("Found {} command(s) in {}", records.len(), dir.display());
        Ok(records)
    }

    /// Rebuild `dev-only/` from the nested source tree, one file at a time.
    ///
    /// Every command is attempted; failures are aggregated into a single error.
    async fn stage_development(&self) -> Result<(), OsmfluxError> {
        let staging = self.managed_dir();

        let mut entries = match fs::read_dir(&self.commands_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(OsmfluxError::io("listing", &self.commands_dir, &e)),
        };

        crate::utils::fs::remove_dir_if_exists(&staging)
            .await
            .map_err(|e| OsmfluxError::io("clearing", &staging, &e))?;
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| OsmfluxError::io("creating", &staging, &e))?;

        let mut commands = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OsmfluxError::io("listing", &self.commands_dir, &e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == DEV_STAGING_DIR || name.starts_with('.') {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                commands.push(name);
            }
        }
        commands.sort();

        let mut failures = Vec::new();
        for command in &commands {
            let source = self.source_path(command);
            if !source.is_file() {
                debug!("No {} build of '{}' at {}", self.platform, command, source.display());
                continue;
            }

            let target = self.installed_path(command);
            if let Err(e) = fs::copy(&source, &target).await {
                warn!("Failed to stage {}: {}", source.display(), e);
                failures.push(format!("{command}: {e}"));
            }
        }

        if failures.is_empty() {
            debug!("Staged development commands into {}", staging.display());
            Ok(())
        } else {
            Err(OsmfluxError::Io {
                operation: "staging".to_string(),
                path: staging.display().to_string(),
                reason: failures.join("; "),
            })
        }
    }
}

fn is_transient(file_name: &str) -> bool {
    file_name.starts_with('.') || file_name.ends_with(".bak") || file_name.ends_with(".tmp")
}
