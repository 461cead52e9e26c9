//! List installed commands.

use super::common::CommandContext;
use crate::update::hasher::{ContentHasher, DigestAlgorithm};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

/// List installed commands with their digests.
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ListedCommand {
    name: String,
    path: String,
    md5: Option<String>,
}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let inventory = ctx.inventory()?;
        let records = inventory.list().await?;

        let mut listed = Vec::with_capacity(records.len());
        for record in records.values() {
            let md5 = ContentHasher::digest_file(DigestAlgorithm::Md5, &record.local_path)
                .await
                .ok()
                .map(|d| d.as_hex().to_string());
            listed.push(ListedCommand {
                name: record.name.clone(),
                path: record.local_path.display().to_string(),
                md5,
            });
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&listed)?);
            return Ok(());
        }

        if listed.is_empty() {
            println!("No commands installed in {}", inventory.managed_dir().display());
            return Ok(());
        }

        for command in &listed {
            println!(
                "{:<16} {}  {}",
                command.name.bold(),
                command.md5.as_deref().unwrap_or("unreadable").dimmed(),
                command.path
            );
        }
        Ok(())
    }
}
