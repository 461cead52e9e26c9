//! Shared helpers for integration tests.
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway OsmFlux installation: an app root with `commands/` and a config file
/// pointing at it.
pub struct TestInstall {
    _temp_dir: TempDir, // Keep alive for RAII cleanup
    app_root: PathBuf,
    config_path: PathBuf,
}

impl TestInstall {
    /// Create an installation with an empty command directory and default config.
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let app_root = temp_dir.path().join("app");
        let config_path = temp_dir.path().join("home").join("config.toml");

        fs::create_dir_all(app_root.join("commands"))?;
        fs::create_dir_all(config_path.parent().context("config path has a parent")?)?;

        let install = Self {
            _temp_dir: temp_dir,
            app_root,
            config_path,
        };
        install.write_config("")?;
        Ok(install)
    }

    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.app_root.join("commands")
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Write the config file; `app_root` is always set to this installation.
    pub fn write_config(&self, extra: &str) -> Result<()> {
        let app_root = self.app_root.display().to_string().replace('\\', "/");
        let content = format!("app_root = \"{app_root}\"\n{extra}");
        fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config to {}", self.config_path.display()))
    }

    /// Place a command file in the flat production layout.
    pub fn add_command(&self, name: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.commands_dir().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Build an `osmflux` invocation bound to this installation's config.
    pub fn osmflux(&self) -> Command {
        let mut cmd = Command::cargo_bin("osmflux").expect("osmflux binary is built");
        cmd.arg("--config")
            .arg(&self.config_path)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("OSMFLUX_CONFIG_PATH");
        cmd
    }
}

/// File assertion helpers
pub struct FileAssert;

impl FileAssert {
    pub fn exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(path.exists(), "Expected file to exist: {}", path.display());
    }

    pub fn not_exists(path: impl AsRef<Path>) {
        let path = path.as_ref();
        assert!(!path.exists(), "Expected file to not exist: {}", path.display());
    }

    pub fn contents(path: impl AsRef<Path>, expected: &[u8]) {
        let path = path.as_ref();
        let actual = fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
        assert_eq!(actual, expected, "Unexpected contents of {}", path.display());
    }
}
