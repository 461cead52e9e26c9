//! Resolve a command path.

use super::common::CommandContext;
use crate::host::CommandRunner;
use anyhow::Result;
use clap::Args;

/// Print the executable path of a managed command.
#[derive(Args, Debug)]
pub struct PathCommand {
    /// Command name, without `.exe`
    name: String,
}

impl PathCommand {
    pub fn execute(self, ctx: &CommandContext) -> Result<()> {
        let runner = CommandRunner::new(ctx.inventory()?);
        println!("{}", runner.resolve(&self.name)?.display());
        Ok(())
    }
}
