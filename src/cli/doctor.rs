//! Environment report.

use super::common::CommandContext;
use crate::host::java_available;
use crate::update::manifest::cache_buster;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Report on the local installation.
#[derive(Args, Debug)]
pub struct DoctorCommand {}

fn mark(ok: bool) -> colored::ColoredString {
    if ok { "✓".green() } else { "✗".red() }
}

impl DoctorCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let config = &ctx.config;
        let inventory = ctx.inventory()?;
        let commands_dir = inventory.commands_dir().to_path_buf();

        println!("{}", "OsmFlux environment".bold());
        println!("  {} platform {}", mark(true), ctx.platform);
        println!("  {} install mode {:?}", mark(true), inventory.mode());

        let dir_ok = commands_dir.is_dir();
        println!("  {} command directory {}", mark(dir_ok), commands_dir.display());

        let count = inventory.list().await.map(|r| r.len());
        match count {
            Ok(count) => println!("  {} {} command(s) installed", mark(count > 0), count),
            Err(e) => println!("  {} cannot list commands: {}", mark(false), e),
        }

        for bundle in &config.bundles {
            let present = inventory.commands_dir().join(&bundle.entry).exists();
            println!("  {} bundle {}", mark(present), bundle.name);
        }

        let java = java_available();
        println!("  {} java on PATH", mark(java));

        println!("  {} storage {}", mark(true), ctx.storage_file()?.display());
        println!(
            "  {} manifest {}",
            mark(true),
            config.endpoint().manifest_url(cache_buster())
        );
        Ok(())
    }
}
