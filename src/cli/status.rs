//! Show update state.

use super::common::CommandContext;
use crate::update::LastCheckRecord;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Show platform, channel and update check state.
#[derive(Args, Debug)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let config = &ctx.config;
        let record = LastCheckRecord::new(ctx.store()?);
        let last = record.read().await;
        let gate = config.update.gate();

        println!("{} {}", "OsmFlux".bold(), env!("CARGO_PKG_VERSION"));
        println!("  platform:   {}", ctx.platform);
        println!("  channel:    {}", config.resolved_channel());
        println!("  server:     {}", config.base_url);
        println!("  commands:   {}", config.commands_dir()?.display());

        match last {
            Some(at) => {
                println!("  last check: {}", at.to_rfc3339());
                if let Some(next) = gate.next_check_at(Some(at)) {
                    println!("  next check: {}", next.to_rfc3339());
                }
            }
            None => println!("  last check: {}", "never".dimmed()),
        }

        if !config.update.check_on_startup {
            println!("  {}", "automatic checks disabled".yellow());
        }

        Ok(())
    }
}
