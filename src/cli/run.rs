//! Execute a managed command.

use super::common::CommandContext;
use crate::host::CommandRunner;
use anyhow::{Result, bail};
use clap::Args;

/// Run a managed command, streaming its output.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Command name, without `.exe`
    name: String,

    /// Arguments passed to the command (after `--`)
    #[arg(last = true)]
    args: Vec<String>,
}

impl RunCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let runner = CommandRunner::new(ctx.inventory()?);
        let status = runner.run(&self.name, &self.args).await?;

        if !status.success() {
            bail!("{} exited with {}", self.name, status);
        }
        Ok(())
    }
}
