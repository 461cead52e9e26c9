//! Capability surface consumed by the update core.
//!
//! The core never talks to the network, the terminal or the process table directly.
//! Everything it needs from its host goes through the traits in this module so every
//! component can be exercised with in-memory fakes (see `test_utils`).
//!
//! | Capability        | Trait                | Production implementation      |
//! |-------------------|----------------------|--------------------------------|
//! | HTTP GET          | [`Transport`]        | [`http::HttpTransport`]        |
//! | Durable key/value | [`KeyValueStore`]    | [`crate::config::JsonFileStore`] |
//! | `chmod +x`        | [`ExecutableMarker`] | [`ChmodMarker`]                |
//! | Dialogs           | [`UserPrompt`]       | [`prompt::TerminalPrompt`]     |
//! | Install/restart   | [`AppInstaller`]     | [`installer::ResourceInstaller`] |
//!
//! Traits return boxed futures so they can be held as `Arc<dyn Trait>` by the
//! orchestrator.

pub mod http;
pub mod installer;
pub mod prompt;
pub mod runner;

use crate::update::manifest::RemoteManifest;
use anyhow::Result;
use futures::future::BoxFuture;
use std::path::Path;

pub use http::HttpTransport;
pub use installer::ResourceInstaller;
pub use prompt::TerminalPrompt;
pub use runner::{CommandRunner, java_available};

/// Performs HTTP GET requests returning the raw body.
pub trait Transport: Send + Sync {
    /// Fetch `url`. Non-success status codes are errors.
    fn get_bytes<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Durable string storage surviving process restarts.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Marks a freshly written file as executable.
pub trait ExecutableMarker: Send + Sync {
    fn mark_executable<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, std::io::Result<()>>;
}

/// Severity of an informational dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Blocking yes/no and informational dialogs.
pub trait UserPrompt: Send + Sync {
    /// Ask a yes/no question. Returns `true` for yes.
    fn confirm<'a>(&'a self, title: &'a str, message: &'a str) -> BoxFuture<'a, bool>;

    fn notify<'a>(&'a self, title: &'a str, message: &'a str, level: NoticeLevel)
    -> BoxFuture<'a, ()>;
}

/// Application-level update: install the new release and restart into it.
pub trait AppInstaller: Send + Sync {
    fn install<'a>(&'a self, manifest: &'a RemoteManifest) -> BoxFuture<'a, Result<()>>;

    /// Restart the application. Does not return on success in production.
    fn restart(&self) -> Result<()>;
}

/// Sets the Unix executable bits with `chmod`-equivalent permissions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChmodMarker;

impl ExecutableMarker for ChmodMarker {
    fn mark_executable<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, std::io::Result<()>> {
        Box::pin(crate::utils::fs::set_executable(path))
    }
}
