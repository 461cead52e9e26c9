//! Common state shared by CLI commands

use crate::config::{GlobalConfig, JsonFileStore};
use crate::host::HttpTransport;
use crate::update::inventory::CommandInventory;
use crate::utils::platform::{self, PlatformKey};
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Loaded configuration plus the resolved host platform.
#[derive(Debug)]
pub struct CommandContext {
    pub config: GlobalConfig,
    /// Config file in use, when given on the command line.
    pub config_path: Option<PathBuf>,
    pub platform: PlatformKey,
}

impl CommandContext {
    /// Load the configuration and resolve the platform.
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = GlobalConfig::load_with_optional(config_path.clone()).await?;
        let platform = platform::resolve()?;

        Ok(Self {
            config,
            config_path,
            platform,
        })
    }

    pub fn inventory(&self) -> Result<CommandInventory> {
        Ok(CommandInventory::new(
            self.config.commands_dir()?,
            self.config.install_mode(),
            self.platform,
        ))
    }

    /// Storage file: configured, else next to an explicit config file, else the default.
    pub fn storage_file(&self) -> Result<PathBuf> {
        if self.config.storage_path.is_none()
            && let Some(dir) = self.config_path.as_deref().and_then(std::path::Path::parent)
        {
            return Ok(dir.join("storage.json"));
        }
        self.config.storage_file()
    }

    pub fn store(&self) -> Result<Arc<JsonFileStore>> {
        Ok(Arc::new(JsonFileStore::new(self.storage_file()?)))
    }

    pub fn transport(&self) -> Result<Arc<HttpTransport>> {
        Ok(Arc::new(HttpTransport::new(self.config.update.request_timeout())?))
    }
}
