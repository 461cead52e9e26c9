//! Global configuration for OsmFlux.
//!
//! The configuration file lives at `~/.osmflux/config.toml`
//! (`%LOCALAPPDATA%\osmflux\config.toml` on Windows). The location can be overridden with
//! the `OSMFLUX_CONFIG_PATH` environment variable. A missing file means defaults.
//!
//! # File Format
//!
//! ```toml
//! base_url = "https://static.mogita.com/osmflux"
//! channel = "dev"                      # optional, overrides dev_mode
//! app_root = "/opt/osmflux"            # directory holding commands/
//! dev_mode = false
//! storage_path = "/home/me/.osmflux/storage.json"
//!
//! [update]
//! check_on_startup = true
//! check_interval = 43200
//! request_timeout = 120
//!
//! [[bundles]]
//! name = "osmosis"
//! url = "https://example.com/osmosis.zip"
//! entry = "osmosis/bin/osmosis"
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use osmflux::config::GlobalConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = GlobalConfig::load().await?;
//! println!("Checking {} on the {} channel", config.base_url, config.resolved_channel());
//! # Ok(())
//! # }
//! ```

use crate::update::bundle::BundleConfig;
use crate::update::config::UpdateConfig;
use crate::update::inventory::InstallMode;
use crate::update::manifest::{Channel, ReleaseEndpoint};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "OSMFLUX_CONFIG_PATH";

/// Release server used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://static.mogita.com/osmflux";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn is_default_base_url(url: &String) -> bool {
    url == DEFAULT_BASE_URL
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Release server root; manifests live under `{base_url}/releases/{channel}/latest`.
    #[serde(default = "default_base_url", skip_serializing_if = "is_default_base_url")]
    pub base_url: String,

    /// Explicit channel. When unset the channel follows `dev_mode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,

    /// Directory holding `commands/` and the resource bundle. Defaults to the directory
    /// of the running executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_root: Option<PathBuf>,

    /// Development checkout: nested per-platform command tree, dev channel.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dev_mode: bool,

    /// File backing the persisted key-value store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "UpdateConfig::is_default")]
    pub update: UpdateConfig,

    /// Archive-distributed auxiliary tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bundles: Vec<BundleConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            channel: None,
            app_root: None,
            dev_mode: false,
            storage_path: None,
            update: UpdateConfig::default(),
            bundles: Vec::new(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, or defaults when the file does not exist.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from the default location.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Write the configuration, omitting values that equal their defaults.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || crate::utils::atomic_write(&path, content.as_bytes()))
            .await
            .context("Config write task failed")?
    }

    /// `OSMFLUX_CONFIG_PATH`, else the platform config location.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
            && !path.is_empty()
        {
            return Ok(PathBuf::from(path));
        }

        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding OsmFlux's own files.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("osmflux")
        } else {
            crate::utils::get_home_dir()?.join(".osmflux")
        };
        Ok(dir)
    }

    /// Configured channel, else `dev` in development mode, else `stable`.
    #[must_use]
    pub fn resolved_channel(&self) -> Channel {
        self.channel.unwrap_or(if self.dev_mode {
            Channel::Dev
        } else {
            Channel::Stable
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> ReleaseEndpoint {
        ReleaseEndpoint::new(self.base_url.clone(), self.resolved_channel())
    }

    #[must_use]
    pub const fn install_mode(&self) -> InstallMode {
        if self.dev_mode {
            InstallMode::Development
        } else {
            InstallMode::Production
        }
    }

    pub fn app_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.app_root {
            return Ok(root.clone());
        }

        let exe = std::env::current_exe().context("Failed to get current executable path")?;
        exe.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow::anyhow!("Executable {} has no parent directory", exe.display()))
    }

    pub fn commands_dir(&self) -> Result<PathBuf> {
        Ok(self.app_root()?.join("commands"))
    }

    /// File backing the key-value store, next to the config file by default.
    pub fn storage_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage_path {
            return Ok(path.clone());
        }

        let config_path = Self::default_path()?;
        let dir = config_path.parent().map_or_else(Self::config_dir, |p| Ok(p.to_path_buf()))?;
        Ok(dir.join("storage.json"))
    }
}
