use crate::core::OsmfluxError;
use crate::update::hasher::{ContentDigest, ContentHasher};
use crate::update::inventory::{CommandInventory, CommandRecord};
use crate::update::manifest::{ReleaseEndpoint, RemoteManifest, cache_buster};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One pending replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlanItem {
    pub command: String,
    pub local_path: PathBuf,
    pub download_url: String,
    pub expected_digest: ContentDigest,
    /// `None` for a fresh install: there is nothing to back up.
    pub previous_digest: Option<ContentDigest>,
}

impl UpdatePlanItem {
    #[must_use]
    pub const fn is_fresh_install(&self) -> bool {
        self.previous_digest.is_none()
    }
}

/// Diffs the local inventory against the manifest.
///
/// Commands present locally but absent from the manifest are left alone; there is no
/// deletion pass.
pub struct UpdatePlanner;

impl UpdatePlanner {
    /// Hash every local record that the manifest publishes a digest for, using the
    /// algorithm of that digest.
    ///
    /// Records that cannot be read keep `local_digest == None`; their errors are returned
    /// so the caller can log them, and [`plan`](Self::plan) skips such records.
    pub async fn attach_digests(
        records: &mut BTreeMap<String, CommandRecord>,
        manifest: &RemoteManifest,
        inventory: &CommandInventory,
    ) -> Vec<OsmfluxError> {
        let mut failures = Vec::new();

        for record in records.values_mut() {
            let Some(expected) = manifest.commands().lookup(&record.name, inventory.platform())
            else {
                continue;
            };

            match ContentHasher::digest_file(expected.algorithm(), &record.local_path).await {
                Ok(digest) => record.local_digest = Some(digest),
                Err(e) => {
                    warn!("Cannot hash {}: {}", record.local_path.display(), e);
                    failures.push(e);
                }
            }
        }

        failures
    }

    /// Compute the commands needing replacement, in manifest name order.
    ///
    /// An item is emitted when a digest is published for the platform and the command
    /// is either not installed or installed with a different digest.
    #[must_use]
    pub fn plan(
        records: &BTreeMap<String, CommandRecord>,
        manifest: &RemoteManifest,
        inventory: &CommandInventory,
        endpoint: &ReleaseEndpoint,
    ) -> Vec<UpdatePlanItem> {
        let platform = inventory.platform();
        let ts = cache_buster();
        let mut items = Vec::new();

        for command in manifest.commands().names() {
            let Some(expected_digest) = manifest.commands().lookup(command, platform) else {
                debug!("'{}' is not published for {}", command, platform);
                continue;
            };

            let (local_path, previous_digest) = match records.get(command) {
                None => (inventory.installed_path(command), None),
                Some(CommandRecord {
                    local_digest: None,
                    local_path,
                    ..
                }) => {
                    warn!("Skipping '{}': installed file {} was not hashed", command, local_path.display());
                    continue;
                }
                Some(CommandRecord {
                    local_digest: Some(local),
                    ..
                }) if *local == expected_digest => {
                    debug!("'{}' is up to date", command);
                    continue;
                }
                Some(record) => (record.local_path.clone(), record.local_digest.clone()),
            };

            items.push(UpdatePlanItem {
                command: command.to_string(),
                local_path,
                download_url: endpoint.command_url(command, platform, ts),
                expected_digest,
                previous_digest,
            });
        }

        items
    }
}
