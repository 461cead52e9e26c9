//! Run one update cycle.

use super::common::CommandContext;
use crate::host::{AppInstaller, ChmodMarker, ResourceInstaller, TerminalPrompt, Transport};
use crate::update::{CheckStatus, Collaborators, Trigger, UpdateOrchestrator, UpdateOutcome};
use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use tracing::info;

/// Check for updates and synchronise command binaries.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Behave like the startup check: skip unless the check interval has elapsed
    #[arg(long)]
    auto: bool,

    /// Accept the install-and-restart prompt without asking
    #[arg(long, conflicts_with = "no")]
    yes: bool,

    /// Decline the install-and-restart prompt without asking
    #[arg(long)]
    no: bool,
}

impl CheckCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        if self.auto && !ctx.config.update.check_on_startup {
            info!("Automatic update checks are disabled");
            return Ok(());
        }

        let preset = match (self.yes, self.no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        let transport: Arc<dyn Transport> = ctx.transport()?;
        let installer: Arc<dyn AppInstaller> = Arc::new(
            ResourceInstaller::new(Arc::clone(&transport), ctx.config.app_root()?)
                .with_restart_args(vec!["status".to_string()]),
        );

        let collaborators = Collaborators {
            transport,
            store: ctx.store()?,
            prompt: Arc::new(TerminalPrompt::new(preset)),
            installer,
            marker: Arc::new(ChmodMarker),
        };

        let orchestrator = UpdateOrchestrator::new(
            collaborators,
            ctx.inventory()?,
            ctx.config.endpoint(),
            env!("CARGO_PKG_VERSION"),
        )
        .with_gate(ctx.config.update.gate())
        .with_bundles(ctx.config.bundles.clone());

        let trigger = if self.auto {
            Trigger::Automatic
        } else {
            Trigger::Manual
        };

        println!("{}", "Checking for updates...".cyan());
        let outcome = orchestrator.run_check(trigger).await;
        print_report(&outcome);
        exit_result(&outcome)
    }
}

/// Turn the outcomes that must exit non-zero into errors.
fn exit_result(outcome: &UpdateOutcome) -> Result<()> {
    if let CheckStatus::Failed(e) = &outcome.status {
        bail!("Update check failed: {e}");
    }
    if outcome.has_severe() {
        bail!("Some commands could not be restored and may be missing or corrupt");
    }
    Ok(())
}

fn print_report(outcome: &UpdateOutcome) {
    for item in &outcome.items {
        match &item.result {
            Ok(()) if item.fresh_install => {
                println!("  {} {} installed", "✓".green(), item.command.bold());
            }
            Ok(()) => println!("  {} {} updated", "✓".green(), item.command.bold()),
            Err(e) if e.is_severe() => println!("  {} {}: {}", "✗".red().bold(), item.command.bold(), e.to_string().red()),
            Err(e) => println!("  {} {}: {}", "✗".yellow(), item.command.bold(), e),
        }
    }

    for bundle in &outcome.bundles {
        match &bundle.result {
            Ok(crate::update::BundleStatus::Installed) => {
                println!("  {} bundle {} installed", "✓".green(), bundle.name.bold());
            }
            Ok(crate::update::BundleStatus::AlreadyPresent) => {}
            Err(e) => println!("  {} {}", "✗".yellow(), e),
        }
    }

    match &outcome.status {
        CheckStatus::Skipped {
            next_check_at,
        } => match next_check_at {
            Some(at) => println!("Skipped: next automatic check after {}", at.to_rfc3339()),
            None => println!("Skipped: automatic check not due"),
        },
        CheckStatus::Busy => println!("{}", "An update check is already running".yellow()),
        CheckStatus::UpToDate => {
            let failed = outcome.failed_items().count();
            if failed > 0 {
                println!("{}", format!("{failed} command(s) failed to update").yellow());
            }
        }
        CheckStatus::RestartRequired {
            latest_version,
            accepted,
        } => {
            if *accepted {
                println!("{}", format!("OsmFlux {latest_version} installed, restarting").green());
            } else {
                println!("OsmFlux {latest_version} is available; run `osmflux check --yes` to install");
            }
        }
        CheckStatus::Failed(_) => {}
    }
}
