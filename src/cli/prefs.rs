//! Persisted directory preferences.

use super::common::CommandContext;
use crate::config::Preferences;
use anyhow::Result;
use clap::{Subcommand, ValueEnum};

#[derive(Subcommand, Debug)]
pub enum PrefsCommand {
    /// Print a remembered directory
    Get {
        key: PrefKey,
    },
    /// Remember a directory
    Set {
        key: PrefKey,
        value: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefKey {
    /// Directory files were last opened from
    OpenedDir,
    /// Directory files were last saved to
    SavedDir,
}

impl PrefsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let prefs = Preferences::new(ctx.store()?);

        match self {
            Self::Get {
                key,
            } => {
                let value = match key {
                    PrefKey::OpenedDir => prefs.last_opened_dir().await,
                    PrefKey::SavedDir => prefs.last_saved_dir().await,
                };
                println!("{value}");
            }
            Self::Set {
                key,
                value,
            } => match key {
                PrefKey::OpenedDir => prefs.set_last_opened_dir(&value).await?,
                PrefKey::SavedDir => prefs.set_last_saved_dir(&value).await?,
            },
        }
        Ok(())
    }
}
