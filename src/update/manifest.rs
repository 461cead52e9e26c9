//! Remote update manifest: shape, URLs and fetching.
//!
//! ```text
//! GET {base}/releases/{channel}/latest/update_manifest.json?ts={epochMillis}
//! {
//!   "applicationId": "com.mogita.osmflux",
//!   "version": "0.3.2",
//!   "resourcesURL": "https://.../resources.neu",
//!   "data": { "commands": { "osmfilter": { "linux": { "x64": "a7d9cc95..." } } } }
//! }
//! ```

use crate::core::OsmfluxError;
use crate::host::Transport;
use crate::update::hasher::ContentDigest;
use crate::utils::platform::PlatformKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Release channel the manifest and binaries are fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Dev,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest published release state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteManifest {
    #[serde(default)]
    pub application_id: String,
    /// Version string of the whole application.
    pub version: String,
    /// Location of the application resource bundle.
    #[serde(rename = "resourcesURL", default)]
    pub resources_url: String,
    #[serde(default)]
    pub data: ManifestData,
}

impl RemoteManifest {
    #[must_use]
    pub const fn commands(&self) -> &CommandDigests {
        &self.data.commands
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestData {
    #[serde(default)]
    pub commands: CommandDigests,
}

/// Per-platform digests of one command, `os -> arch -> digest`.
///
/// Entries that do not have that shape are kept as unpublished so that one malformed
/// command cannot make the whole manifest unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformDigests {
    Published(BTreeMap<String, OsDigests>),
    Unpublished(serde_json::Value),
}

/// Digests of one command on one OS.
///
/// A bare string is one digest for every architecture of that OS. A malformed entry only
/// unpublishes its own OS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OsDigests {
    ByArch(BTreeMap<String, String>),
    AnyArch(String),
    Malformed(serde_json::Value),
}

impl OsDigests {
    fn get(&self, arch: &str) -> Option<&str> {
        match self {
            Self::ByArch(by_arch) => by_arch.get(arch).map(String::as_str),
            Self::AnyArch(digest) => Some(digest),
            Self::Malformed(_) => None,
        }
    }
}

/// `command -> os -> arch -> digest`, queried through [`lookup`](Self::lookup).
///
/// Commands iterate in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandDigests(BTreeMap<String, PlatformDigests>);

impl CommandDigests {
    /// Command names published in the manifest.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Expected digest of `command` for `platform`, if one is published.
    ///
    /// Unparsable digests are logged and treated as not published.
    #[must_use]
    pub fn lookup(&self, command: &str, platform: &PlatformKey) -> Option<ContentDigest> {
        let PlatformDigests::Published(by_os) = self.0.get(command)? else {
            warn!("Manifest entry for '{}' is malformed, ignoring it", command);
            return None;
        };

        let os_digests = by_os.get(platform.os.as_str())?;
        if let OsDigests::Malformed(_) = os_digests {
            warn!("Manifest entry for '{}' on {} is malformed, ignoring it", command, platform.os);
            return None;
        }
        let raw = os_digests.get(platform.arch.as_str())?;

        match ContentDigest::parse(raw) {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!("Ignoring digest for '{}' on {}: {}", command, platform, e);
                None
            }
        }
    }

    /// Record a digest. Used to build manifests programmatically.
    pub fn insert(&mut self, command: &str, platform: &PlatformKey, digest: &str) {
        let entry = self
            .0
            .entry(command.to_string())
            .or_insert_with(|| PlatformDigests::Published(BTreeMap::new()));

        if let PlatformDigests::Unpublished(_) = entry {
            *entry = PlatformDigests::Published(BTreeMap::new());
        }

        if let PlatformDigests::Published(by_os) = entry {
            let os_digests = by_os
                .entry(platform.os.as_str().to_string())
                .or_insert_with(|| OsDigests::ByArch(BTreeMap::new()));
            if !matches!(os_digests, OsDigests::ByArch(_)) {
                *os_digests = OsDigests::ByArch(BTreeMap::new());
            }
            if let OsDigests::ByArch(by_arch) = os_digests {
                by_arch.insert(platform.arch.as_str().to_string(), digest.to_string());
            }
        }
    }
}

/// Where releases for one channel are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEndpoint {
    base_url: String,
    channel: Channel,
}

impl ReleaseEndpoint {
    pub fn new(base_url: impl Into<String>, channel: Channel) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            channel,
        }
    }

    #[must_use]
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    fn latest(&self) -> String {
        format!("{}/releases/{}/latest", self.base_url, self.channel)
    }

    /// Manifest URL with a cache-busting timestamp.
    #[must_use]
    pub fn manifest_url(&self, ts_millis: i64) -> String {
        format!("{}/update_manifest.json?ts={ts_millis}", self.latest())
    }

    /// Download URL of one command binary with a cache-busting timestamp.
    #[must_use]
    pub fn command_url(&self, command: &str, platform: &PlatformKey, ts_millis: i64) -> String {
        format!(
            "{}/commands/{command}/{}/{}/{}?ts={ts_millis}",
            self.latest(),
            platform.os,
            platform.arch,
            platform.executable_name(command)
        )
    }
}

/// Current time in epoch milliseconds, used as the cache-busting parameter.
#[must_use]
pub fn cache_buster() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Retrieves the manifest for one channel. Never caches.
pub struct ManifestFetcher {
    transport: Arc<dyn Transport>,
    endpoint: ReleaseEndpoint,
}

impl ManifestFetcher {
    pub fn new(transport: Arc<dyn Transport>, endpoint: ReleaseEndpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// Fetch and parse the latest manifest.
    ///
    /// # Errors
    ///
    /// Network and parse failures are both reported as [`OsmfluxError::ManifestFetch`].
    pub async fn fetch(&self) -> Result<RemoteManifest, OsmfluxError> {
        let url = self.endpoint.manifest_url(cache_buster());
        debug!("Fetching update manifest from {}", url);

        let body = self.transport.get_bytes(&url).await.map_err(|e| {
            OsmfluxError::ManifestFetch {
                url: url.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        let manifest: RemoteManifest =
            serde_json::from_slice(&body).map_err(|e| OsmfluxError::ManifestFetch {
                url: url.clone(),
                reason: format!("invalid manifest: {e}"),
            })?;

        info!(
            "Manifest {} lists version {} and {} command(s)",
            self.endpoint.channel(),
            manifest.version,
            manifest.commands().len()
        );
        Ok(manifest)
    }
}
