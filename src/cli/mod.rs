//! Command-line interface for OsmFlux.
//!
//! The CLI drives the update core headlessly: every command loads the global
//! configuration, resolves the host platform and then calls into [`crate::update`].
//!
//! # Available Commands
//!
//! - `check` - Run an update cycle (manual, or gated with `--auto`)
//! - `status` - Show channel, platform and last check time
//! - `list` - List installed commands and their digests
//! - `path` - Print the executable path of a command
//! - `run` - Execute a managed command
//! - `prefs` - Read or write the remembered open/save directories
//! - `doctor` - Report on the local installation
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - debug logging
//! - `--quiet` / `-q` - errors only
//! - `--config <PATH>` - alternate config file (also `OSMFLUX_CONFIG_PATH`)
//!
//! Logs go to stderr; `RUST_LOG` overrides the level chosen by the flags.
//!
//! # Examples
//!
//! ```bash
//! # Startup check, honouring the 12 hour cadence
//! osmflux check --auto --no
//!
//! # Check now and accept a new application version
//! osmflux --verbose check --yes
//!
//! # Run a tool
//! osmflux run osmfilter -- input.osm --keep="highway=*" -o=roads.osm
//! ```

mod check;
pub mod common;
mod doctor;
mod list;
mod path;
mod prefs;
mod run;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::CommandContext;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "osmflux",
    about = "OsmFlux - keep the OpenStreetMap command toolchain up to date",
    version,
    long_about = "Synchronises the native OpenStreetMap tools shipped with OsmFlux against the \
                  published release manifest and reports application updates."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for updates and synchronise command binaries
    Check(check::CheckCommand),

    /// Show update state
    Status(status::StatusCommand),

    /// List installed commands
    List(list::ListCommand),

    /// Print the executable path of a command
    Path(path::PathCommand),

    /// Run a managed command
    Run(run::RunCommand),

    /// Read or write remembered directories
    #[command(subcommand)]
    Prefs(prefs::PrefsCommand),

    /// Report on the local installation
    Doctor(doctor::DoctorCommand),
}

impl Cli {
    /// Install logging, load the configuration and run the selected command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let ctx = CommandContext::load(self.config).await?;

        match self.command {
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Status(cmd) => cmd.execute(&ctx).await,
            Commands::List(cmd) => cmd.execute(&ctx).await,
            Commands::Path(cmd) => cmd.execute(&ctx),
            Commands::Run(cmd) => cmd.execute(&ctx).await,
            Commands::Prefs(cmd) => cmd.execute(&ctx).await,
            Commands::Doctor(cmd) => cmd.execute(&ctx).await,
        }
    }

    /// Log level selected by the verbosity flags.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("osmflux={}", self.log_level())));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}
