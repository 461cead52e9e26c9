//! Test utilities for OsmFlux
//!
//! In-memory implementations of every host capability the update core consumes, so
//! cycles can be exercised without a network, a terminal or a real installation.
//!
//! | Fake                   | Capability         |
//! |------------------------|--------------------|
//! | [`FakeTransport`]      | `Transport`        |
//! | [`MemoryStore`]        | `KeyValueStore`    |
//! | [`ScriptedPrompt`]     | `UserPrompt`       |
//! | [`RecordingInstaller`] | `AppInstaller`     |
//! | [`FailingMarker`]      | `ExecutableMarker` |
//!
//! Fakes are cheap to clone and clones share state, so a test can keep a handle for
//! assertions after moving the fake into an `Arc<dyn ...>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use osmflux::test_utils::FakeTransport;
//!
//! let transport = FakeTransport::new()
//!     .with_body("https://example.com/update_manifest.json", br#"{"version":"1.0.0"}"#.to_vec());
//! let handle = transport.clone();
//! // ... move `transport` into the code under test ...
//! assert!(handle.requests().is_empty());
//! ```

use crate::host::{AppInstaller, ExecutableMarker, KeyValueStore, NoticeLevel, Transport, UserPrompt};
use crate::update::manifest::RemoteManifest;
use anyhow::{Result, anyhow, bail};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Respects `RUST_LOG` when set, otherwise uses `level`; with neither, tests stay
/// silent.
///
/// ```bash
/// RUST_LOG=osmflux=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Serves canned bodies keyed by URL. The query string is ignored when matching, so
/// cache-busting parameters do not need to be predicted. Unknown URLs fail like a 404.
#[derive(Clone, Default)]
pub struct FakeTransport {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl FakeTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_body(self, url: &str, body: Vec<u8>) -> Self {
        self.set_body(url, body);
        self
    }

    /// Sleep before answering every request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Add or replace a body on a transport that is already in use.
    pub fn set_body(&self, url: &str, body: Vec<u8>) {
        lock(&self.bodies).insert(strip_query(url).to_string(), body);
    }

    /// Every URL requested so far, in order, including query strings.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

impl Transport for FakeTransport {
    fn get_bytes<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            lock(&self.requests).push(url.to_string());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            lock(&self.bodies)
                .get(strip_query(url))
                .cloned()
                .ok_or_else(|| anyhow!("GET {url} returned HTTP 404 Not Found"))
        })
    }
}

/// Key-value store held in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(lock(&self.values).get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            lock(&self.values).insert(key.to_string(), value.to_string());
            Ok(())
        })
    }
}

/// Answers every confirmation with a fixed value and records what was shown.
#[derive(Clone)]
pub struct ScriptedPrompt {
    answer: bool,
    confirmations: Arc<Mutex<Vec<String>>>,
    notices: Arc<Mutex<Vec<(String, String, NoticeLevel)>>>,
}

impl ScriptedPrompt {
    #[must_use]
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            confirmations: Arc::default(),
            notices: Arc::default(),
        }
    }

    /// Messages of every confirmation asked.
    #[must_use]
    pub fn confirmations(&self) -> Vec<String> {
        lock(&self.confirmations).clone()
    }

    /// `(title, message, level)` of every notice shown.
    #[must_use]
    pub fn notices(&self) -> Vec<(String, String, NoticeLevel)> {
        lock(&self.notices).clone()
    }
}

impl UserPrompt for ScriptedPrompt {
    fn confirm<'a>(&'a self, _title: &'a str, message: &'a str) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            lock(&self.confirmations).push(message.to_string());
            self.answer
        })
    }

    fn notify<'a>(
        &'a self,
        title: &'a str,
        message: &'a str,
        level: NoticeLevel,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            lock(&self.notices).push((title.to_string(), message.to_string(), level));
        })
    }
}

/// Records install and restart requests instead of performing them.
#[derive(Clone, Default)]
pub struct RecordingInstaller {
    installed: Arc<Mutex<Vec<String>>>,
    restarts: Arc<AtomicUsize>,
    fail_install: bool,
}

impl RecordingInstaller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An installer whose `install` always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_install: true,
            ..Self::default()
        }
    }

    /// Versions passed to `install`, in order.
    #[must_use]
    pub fn installed_versions(&self) -> Vec<String> {
        lock(&self.installed).clone()
    }

    #[must_use]
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl AppInstaller for RecordingInstaller {
    fn install<'a>(&'a self, manifest: &'a RemoteManifest) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.fail_install {
                bail!("resource download interrupted");
            }
            lock(&self.installed).push(manifest.version.clone());
            Ok(())
        })
    }

    fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Marker whose permission change always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMarker;

impl ExecutableMarker for FailingMarker {
    fn mark_executable<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, std::io::Result<()>> {
        Box::pin(async {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "operation not permitted"))
        })
    }
}

/// Marker that deletes the `<path>.bak` backup before failing, so the rollback that
/// follows has nothing to restore.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupLosingMarker;

impl ExecutableMarker for BackupLosingMarker {
    fn mark_executable<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, std::io::Result<()>> {
        Box::pin(async move {
            let mut backup = path.as_os_str().to_owned();
            backup.push(".bak");
            crate::utils::fs::remove_file_if_exists(Path::new(&backup)).await?;
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "operation not permitted"))
        })
    }
}

/// Build an in-memory zip archive from `(name, content)` pairs.
///
/// Entries are stored with mode `0o755`.
///
/// # Panics
///
/// Panics if the archive cannot be written, which only happens on invalid names.
#[must_use]
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
        for (name, content) in entries {
            writer.start_file(*name, options).expect("start zip entry");
            writer.write_all(content).expect("write zip entry");
        }
        writer.finish().expect("finish zip archive");
    }
    buffer
}
