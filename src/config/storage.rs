//! Persisted key-value storage and the preferences built on it.

use crate::host::KeyValueStore;
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Key of the directory last used to open a file.
pub const LAST_OPENED_DIR_KEY: &str = "osmflux_last_opened_dir";
/// Key of the directory last used to save a file.
pub const LAST_SAVED_DIR_KEY: &str = "osmflux_last_saved_dir";

/// Flat JSON object of string values in a single file.
///
/// Every write rewrites the whole file atomically. A missing file is an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            Ok(self.read_all().await?.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;

            let mut values = self.read_all().await?;
            values.insert(key.to_string(), value.to_string());

            let content = serde_json::to_vec_pretty(&values).context("Failed to serialize store")?;
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || crate::utils::atomic_write(&path, &content))
                .await
                .context("Store write task failed")?
        })
    }
}

/// Remembered directories for file dialogs.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
        }
    }

    /// Last directory a file was opened from, `/` when unknown.
    pub async fn last_opened_dir(&self) -> String {
        self.read_or_root(LAST_OPENED_DIR_KEY).await
    }

    pub async fn set_last_opened_dir(&self, dir: &str) -> Result<()> {
        self.store.set(LAST_OPENED_DIR_KEY, dir).await
    }

    /// Last directory a file was saved to, `/` when unknown.
    pub async fn last_saved_dir(&self) -> String {
        self.read_or_root(LAST_SAVED_DIR_KEY).await
    }

    pub async fn set_last_saved_dir(&self, dir: &str) -> Result<()> {
        self.store.set(LAST_SAVED_DIR_KEY, dir).await
    }

    async fn read_or_root(&self, key: &str) -> String {
        match self.store.get(key).await {
            Ok(Some(dir)) if !dir.is_empty() => dir,
            Ok(_) => "/".to_string(),
            Err(e) => {
                warn!("Failed to read preference {}: {:#}", key, e);
                "/".to_string()
            }
        }
    }
}
