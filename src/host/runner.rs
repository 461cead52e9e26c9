//! Running managed commands.

use crate::core::OsmfluxError;
use crate::update::inventory::CommandInventory;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Executes commands from the managed command directory.
///
/// The command line is echoed as `► <command line>` and output is streamed line by line
/// as it arrives.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    inventory: CommandInventory,
}

impl CommandRunner {
    pub fn new(inventory: CommandInventory) -> Self {
        Self {
            inventory,
        }
    }

    /// Path of `name`, which must exist.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, OsmfluxError> {
        let path = self.inventory.command_path(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(OsmfluxError::CommandNotFound {
                name: name.to_string(),
                path: path.display().to_string(),
            })
        }
    }

    /// Run `name` with `args` and wait for it to exit.
    pub async fn run(&self, name: &str, args: &[String]) -> Result<ExitStatus> {
        let path = self.resolve(name)?;

        let mut line = path.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        println!("{}", format!("► {line}").cyan());

        let mut child = Command::new(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", path.display()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(stream_lines(name, stdout, false), stream_lines(name, stderr, true));

        let status = child.wait().await.with_context(|| format!("Failed to wait for {name}"))?;
        debug!("{} exited with {}", name, status);
        Ok(status)
    }
}

async fn stream_lines<R: AsyncRead + Unpin>(name: &str, source: Option<R>, is_stderr: bool) {
    let Some(source) = source else {
        return;
    };

    // Invalid UTF-8 is replaced rather than ending the read, so the pipe keeps draining
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(target: "command", "{}: stopped reading output: {}", name, e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        debug!(target: "command", "{}: {}", name, line);
        if is_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

/// Whether a `java` executable is on `PATH`. The clipping bundle needs one.
#[must_use]
pub fn java_available() -> bool {
    which::which("java").is_ok()
}
