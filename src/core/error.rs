//! Error handling for OsmFlux
//!
//! This module provides the error taxonomy of the update core and the user-friendly
//! rendering used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so the orchestrator can tell a per-item failure from a
//!    cycle-level one
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Cycle-level**: [`OsmfluxError::PlatformDetection`], [`OsmfluxError::ManifestFetch`].
//!   These abort the current check and are shown to the user once.
//! - **Item-level**: [`OsmfluxError::BackupFailed`], [`OsmfluxError::DownloadFailed`],
//!   [`OsmfluxError::IntegrityMismatch`], [`OsmfluxError::PermissionFixFailed`] and
//!   [`OsmfluxError::RollbackFailed`]. These are collected per plan item and never leave
//!   the batch loop.
//! - **Local**: [`OsmfluxError::Io`], [`OsmfluxError::Config`],
//!   [`OsmfluxError::CommandNotFound`], [`OsmfluxError::BundleFailed`].
//!
//! `RollbackFailed` is the most severe per-item outcome: the command may be missing or
//! corrupt under its original name afterwards.
//!
//! # Examples
//!
//! ```rust,no_run
//! use osmflux::core::{OsmfluxError, ErrorContext, user_friendly_error};
//!
//! let error = OsmfluxError::ManifestFetch {
//!     url: "https://example.com/update_manifest.json".to_string(),
//!     reason: "connection refused".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Every failure the update core can report.
///
/// Wrapped causes are carried as strings so the enum stays `Clone` and outcomes can be
/// stored, compared in tests and rendered more than once.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OsmfluxError {
    /// The host did not report a usable OS name or CPU architecture.
    #[error("Unable to detect platform: {reason}")]
    PlatformDetection {
        /// What was reported (or missing).
        reason: String,
    },

    /// The remote manifest could not be fetched or parsed.
    #[error("Failed to fetch update manifest from {url}: {reason}")]
    ManifestFetch {
        /// Manifest URL including the cache-busting parameter.
        url: String,
        /// Network or parse failure.
        reason: String,
    },

    /// Moving the installed file aside failed; nothing was downloaded.
    #[error("Failed to back up '{command}': {reason}")]
    BackupFailed {
        /// Command name.
        command: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// The replacement binary could not be downloaded or written.
    #[error("Failed to download '{command}': {reason}")]
    DownloadFailed {
        /// Command name.
        command: String,
        /// Network or write failure.
        reason: String,
    },

    /// The written file does not hash to the published digest.
    #[error("Digest mismatch for '{command}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Command name.
        command: String,
        /// Digest published in the manifest.
        expected: String,
        /// Digest of the file that was written.
        actual: String,
    },

    /// Setting the executable bit on the new file failed.
    #[error("Failed to make '{command}' executable: {reason}")]
    PermissionFixFailed {
        /// Command name.
        command: String,
        /// Underlying I/O failure.
        reason: String,
    },

    /// Restoring the backup failed; the command may now be missing or corrupt.
    #[error("Rollback of '{command}' failed after '{cause}': {reason}")]
    RollbackFailed {
        /// Command name.
        command: String,
        /// The failure that triggered the rollback.
        cause: String,
        /// Why the restore itself failed.
        reason: String,
    },

    /// Generic local filesystem failure, contextualised by the operation.
    #[error("I/O error while {operation} {path}: {reason}")]
    Io {
        /// What was being done ("reading", "listing", ...).
        operation: String,
        /// Path involved.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// A managed command is not installed.
    #[error("Command '{name}' is not installed at {path}")]
    CommandNotFound {
        /// Command name.
        name: String,
        /// Where it was expected.
        path: String,
    },

    /// An auxiliary bundle could not be installed.
    #[error("Failed to install bundle '{name}': {reason}")]
    BundleFailed {
        /// Bundle name.
        name: String,
        /// Aggregated failure description.
        reason: String,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Message shown to the user.
        message: String,
    },
}

impl OsmfluxError {
    /// Build an [`OsmfluxError::Io`] from a `std::io::Error`.
    pub fn io(operation: impl Into<String>, path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Whether the error belongs to a single plan item and must not abort the cycle.
    #[must_use]
    pub const fn is_item_scoped(&self) -> bool {
        matches!(
            self,
            Self::BackupFailed { .. }
                | Self::DownloadFailed { .. }
                | Self::IntegrityMismatch { .. }
                | Self::PermissionFixFailed { .. }
                | Self::RollbackFailed { .. }
        )
    }

    /// Whether the error can leave a previously working command broken.
    #[must_use]
    pub const fn is_severe(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Error context wrapper that provides user-friendly error information.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error.
    pub error: OsmfluxError,
    /// Optional suggestion for resolving the error.
    pub suggestion: Option<String>,
    /// Optional additional details about the error.
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: OsmfluxError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(osmflux_error) = error.downcast_ref::<OsmfluxError>() {
        return create_error_context(osmflux_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(OsmfluxError::Io {
                    operation: "accessing".to_string(),
                    path: "unknown".to_string(),
                    reason: io_error.to_string(),
                })
                .with_suggestion(
                    "Check that the OsmFlux installation directory is writable by your user",
                );
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(OsmfluxError::Io {
                    operation: "opening".to_string(),
                    path: "unknown".to_string(),
                    reason: io_error.to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(OsmfluxError::Config {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of ~/.osmflux/config.toml");
    }

    // Generic error - include the full chain
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(OsmfluxError::Other {
        message,
    })
}

fn create_error_context(error: OsmfluxError) -> ErrorContext {
    match &error {
        OsmfluxError::PlatformDetection {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("OsmFlux ships binaries for linux, darwin and windows on x64 and arm64")
            .with_details("Updates are refused rather than guessing a platform"),
        OsmfluxError::ManifestFetch {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check your network connection and run `osmflux check` again")
            .with_details("No command binaries were touched"),
        OsmfluxError::RollbackFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `osmflux check` again to reinstall the affected command")
            .with_details("The previous binary could not be restored under its original name"),
        OsmfluxError::CommandNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run `osmflux check` to download the managed commands"),
        OsmfluxError::Config {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check ~/.osmflux/config.toml or the OSMFLUX_CONFIG_PATH variable"),
        _ => ErrorContext::new(error),
    }
}
