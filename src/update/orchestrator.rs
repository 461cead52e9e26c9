//! One update cycle from cadence check to restart decision.
//!
//! ```text
//! Idle ──(gate passes | manual)──> Fetching ──> Planning ──> Updating (0..N items)
//!      ──> Bundles ──> ComparingVersion ──> UpToDate | RestartRequired | Failed
//! ```
//!
//! Command updates are applied before the application version is compared and do not
//! depend on the restart decision.

use crate::core::OsmfluxError;
use crate::host::{
    AppInstaller, ExecutableMarker, KeyValueStore, NoticeLevel, Transport, UserPrompt,
};
use crate::update::bundle::{BundleConfig, BundleInstaller, BundleStatus};
use crate::update::cadence::{CadenceGate, LastCheckRecord};
use crate::update::inventory::CommandInventory;
use crate::update::manifest::{Channel, ManifestFetcher, ReleaseEndpoint, RemoteManifest};
use crate::update::planner::UpdatePlanner;
use crate::update::updater::BinaryUpdater;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// What started the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Background check on application start, subject to the cadence gate.
    Automatic,
    /// User-initiated; always runs.
    Manual,
}

/// Result of one planned command replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub command: String,
    pub fresh_install: bool,
    pub result: Result<(), OsmfluxError>,
}

impl ItemReport {
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub name: String,
    pub result: Result<BundleStatus, OsmfluxError>,
}

/// Terminal state of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Automatic check not due yet.
    Skipped {
        next_check_at: Option<DateTime<Utc>>,
    },
    /// Another cycle is running.
    Busy,
    UpToDate,
    /// The published application version differs from the running one.
    RestartRequired {
        latest_version: String,
        accepted: bool,
    },
    Failed(OsmfluxError),
}

/// Everything a caller needs to report a cycle.
///
/// A cycle can end [`CheckStatus::UpToDate`] with failed items; use
/// [`is_clean`](Self::is_clean) to tell that apart from a fully successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub status: CheckStatus,
    pub items: Vec<ItemReport>,
    pub bundles: Vec<BundleReport>,
}

impl UpdateOutcome {
    fn terminal(status: CheckStatus) -> Self {
        Self {
            status,
            items: Vec::new(),
            bundles: Vec::new(),
        }
    }

    pub fn failed_items(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|item| !item.succeeded())
    }

    pub fn updated_items(&self) -> impl Iterator<Item = &ItemReport> {
        self.items.iter().filter(|item| item.succeeded())
    }

    /// Any item whose rollback failed, leaving a command possibly broken.
    #[must_use]
    pub fn has_severe(&self) -> bool {
        self.items.iter().any(|item| matches!(&item.result, Err(e) if e.is_severe()))
    }

    /// The cycle ran, and every item and bundle succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !matches!(self.status, CheckStatus::Failed(_) | CheckStatus::Busy)
            && self.failed_items().next().is_none()
            && self.bundles.iter().all(|b| b.result.is_ok())
    }
}

/// Host capabilities the orchestrator runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn KeyValueStore>,
    pub prompt: Arc<dyn UserPrompt>,
    pub installer: Arc<dyn AppInstaller>,
    pub marker: Arc<dyn ExecutableMarker>,
}

/// Runs update cycles. At most one cycle runs at a time per orchestrator.
pub struct UpdateOrchestrator {
    collaborators: Collaborators,
    inventory: CommandInventory,
    endpoint: ReleaseEndpoint,
    gate: CadenceGate,
    current_version: String,
    bundles: Vec<BundleConfig>,
    running: AtomicBool,
}

/// Clears the running flag when the cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl UpdateOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        inventory: CommandInventory,
        endpoint: ReleaseEndpoint,
        current_version: impl Into<String>,
    ) -> Self {
        Self {
            collaborators,
            inventory,
            endpoint,
            gate: CadenceGate::default(),
            current_version: current_version.into(),
            bundles: Vec::new(),
            running: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: CadenceGate) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn with_bundles(mut self, bundles: Vec<BundleConfig>) -> Self {
        self.bundles = bundles;
        self
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[must_use]
    pub const fn inventory(&self) -> &CommandInventory {
        &self.inventory
    }

    #[must_use]
    pub const fn gate(&self) -> &CadenceGate {
        &self.gate
    }

    pub fn last_check(&self) -> LastCheckRecord {
        LastCheckRecord::new(Arc::clone(&self.collaborators.store))
    }

    /// Run one cycle.
    ///
    /// Never returns an error: cycle-level failures end in [`CheckStatus::Failed`] after
    /// a single error notice, item failures are collected into the outcome.
    pub async fn run_check(&self, trigger: Trigger) -> UpdateOutcome {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            debug!("Update check already in progress");
            return UpdateOutcome::terminal(CheckStatus::Busy);
        };

        let record = self.last_check();
        let now = Utc::now();

        // Only automatic checks are gated and recorded; a manual check leaves the schedule alone
        if trigger == Trigger::Automatic {
            let last = record.read().await;
            if !self.gate.should_check_now(last, now) {
                let next_check_at = self.gate.next_check_at(last);
                debug!("Skipping automatic update check until {:?}", next_check_at);
                return UpdateOutcome::terminal(CheckStatus::Skipped {
                    next_check_at,
                });
            }

            // Recorded before fetching so that a failing server is not hit on every start
            if let Err(e) = record.write(now).await {
                warn!("Failed to record update check time: {:#}", e);
            }
        }

        if self.endpoint.channel() == Channel::Dev {
            info!("checking update on dev channel");
        }

        let fetcher =
            ManifestFetcher::new(Arc::clone(&self.collaborators.transport), self.endpoint.clone());
        let manifest = match fetcher.fetch().await {
            Ok(manifest) => manifest,
            Err(e) => return self.fail(e).await,
        };

        let mut outcome = UpdateOutcome::terminal(CheckStatus::UpToDate);
        match self.update_commands(&manifest).await {
            Ok(items) => outcome.items = items,
            Err(e) => return self.fail(e).await,
        }
        outcome.bundles = self.ensure_bundles().await;
        outcome.status = self.compare_version(&manifest, trigger).await;
        outcome
    }

    async fn fail(&self, error: OsmfluxError) -> UpdateOutcome {
        error!("Update check failed: {}", error);
        self.collaborators
            .prompt
            .notify("Update check failed", &error.to_string(), NoticeLevel::Error)
            .await;
        UpdateOutcome::terminal(CheckStatus::Failed(error))
    }

    async fn update_commands(
        &self,
        manifest: &RemoteManifest,
    ) -> Result<Vec<ItemReport>, OsmfluxError> {
        let mut records = self.inventory.list().await?;
        for failure in UpdatePlanner::attach_digests(&mut records, manifest, &self.inventory).await
        {
            debug!("Hashing failure: {}", failure);
        }

        let plan = UpdatePlanner::plan(&records, manifest, &self.inventory, &self.endpoint);
        if plan.is_empty() {
            info!("All commands are up to date");
            return Ok(Vec::new());
        }
        info!("{} command(s) to update", plan.len());

        let updater = BinaryUpdater::new(
            Arc::clone(&self.collaborators.transport),
            Arc::clone(&self.collaborators.marker),
            self.inventory.platform(),
        );

        let mut reports = Vec::with_capacity(plan.len());
        for item in &plan {
            let result = updater.apply(item).await;
            if let Err(e) = &result {
                if e.is_severe() {
                    error!("'{}' may be broken: {}", item.command, e);
                } else {
                    warn!("Failed to update '{}': {}", item.command, e);
                }
            }
            reports.push(ItemReport {
                command: item.command.clone(),
                fresh_install: item.is_fresh_install(),
                result,
            });
        }

        Ok(reports)
    }

    async fn ensure_bundles(&self) -> Vec<BundleReport> {
        if self.bundles.is_empty() {
            return Vec::new();
        }

        // Not the managed dir: the development staging dir is rebuilt on every listing
        let installer = BundleInstaller::new(
            Arc::clone(&self.collaborators.transport),
            Arc::clone(&self.collaborators.marker),
            self.inventory.commands_dir().to_path_buf(),
        );

        let mut reports = Vec::with_capacity(self.bundles.len());
        for bundle in &self.bundles {
            let result = installer.ensure(bundle).await;
            if let Err(e) = &result {
                warn!("{}", e);
            }
            reports.push(BundleReport {
                name: bundle.name.clone(),
                result,
            });
        }
        reports
    }

    async fn compare_version(&self, manifest: &RemoteManifest, trigger: Trigger) -> CheckStatus {
        let prompt = &self.collaborators.prompt;

        if manifest.version == self.current_version {
            info!("OsmFlux {} is the latest version", self.current_version);
            if trigger == Trigger::Manual {
                prompt
                    .notify("No update", "You have the latest version of OsmFlux.", NoticeLevel::Info)
                    .await;
            }
            return CheckStatus::UpToDate;
        }

        info!("OsmFlux {} is available (running {})", manifest.version, self.current_version);
        let message = format!(
            "OsmFlux {} is available, you are running {}. Update and restart now?",
            manifest.version, self.current_version
        );
        let accepted = prompt.confirm("Update available", &message).await;

        if accepted {
            let installer = &self.collaborators.installer;
            if let Err(e) = installer.install(manifest).await {
                let error = OsmfluxError::Other {
                    message: format!("Failed to install OsmFlux {}: {e:#}", manifest.version),
                };
                error!("{}", error);
                prompt.notify("Update failed", &error.to_string(), NoticeLevel::Error).await;
                return CheckStatus::Failed(error);
            }
            if let Err(e) = installer.restart() {
                warn!("Installed OsmFlux {} but could not restart: {:#}", manifest.version, e);
            }
        } else {
            info!("Restart declined; commands stay updated");
        }

        CheckStatus::RestartRequired {
            latest_version: manifest.version.clone(),
            accepted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChmodMarker;
    use crate::test_utils::{FakeTransport, MemoryStore, RecordingInstaller, ScriptedPrompt};
    use crate::update::cadence::LAST_CHECK_KEY;
    use crate::update::hasher::{ContentHasher, DigestAlgorithm};
    use crate::update::inventory::InstallMode;
    use crate::utils::platform::{Arch, Os, PlatformKey};
    use std::path::Path;
    use tempfile::TempDir;

    const BASE: &str = "https://example.com/osmflux";
    const MANIFEST_URL: &str =
        "https://example.com/osmflux/releases/stable/latest/update_manifest.json";

    fn linux() -> PlatformKey {
        PlatformKey::new(Os::Linux, Arch::X64)
    }

    fn command_url(name: &str) -> String {
        format!("{BASE}/releases/stable/latest/commands/{name}/linux/x64/{name}")
    }

    fn manifest_json(version: &str, commands: &[(&str, &[u8])]) -> Vec<u8> {
        let mut manifest = RemoteManifest {
            application_id: "com.mogita.osmflux".to_string(),
            version: version.to_string(),
            resources_url: format!("{BASE}/releases/stable/latest/resources.neu"),
            data: Default::default(),
        };
        for (name, content) in commands {
            let digest = ContentHasher::digest(DigestAlgorithm::Md5, content);
            manifest.data.commands.insert(name, &linux(), digest.as_hex());
        }
        serde_json::to_vec(&manifest).unwrap()
    }

    struct Harness {
        _temp: TempDir,
        store: Arc<MemoryStore>,
        prompt: Arc<ScriptedPrompt>,
        installer: Arc<RecordingInstaller>,
        orchestrator: UpdateOrchestrator,
    }

    fn harness(transport: FakeTransport, answer: bool) -> Harness {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let prompt = Arc::new(ScriptedPrompt::answering(answer));
        let installer = Arc::new(RecordingInstaller::new());
        let collaborators = Collaborators {
            transport: Arc::new(transport),
            store: store.clone(),
            prompt: prompt.clone(),
            installer: installer.clone(),
            marker: Arc::new(ChmodMarker),
        };
        let inventory =
            CommandInventory::new(temp.path().join("commands"), InstallMode::Production, linux());
        let orchestrator = UpdateOrchestrator::new(
            collaborators,
            inventory,
            ReleaseEndpoint::new(BASE, Channel::Stable),
            "0.3.2",
        );
        Harness {
            _temp: temp,
            store,
            prompt,
            installer,
            orchestrator,
        }
    }

    fn write_command(dir: &Path, name: &str, content: &[u8]) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_manual_check_installs_commands_and_reports_up_to_date() {
        let transport = FakeTransport::new()
            .with_body(MANIFEST_URL, manifest_json("0.3.2", &[("osmfilter", b"filter")]))
            .with_body(&command_url("osmfilter"), b"filter".to_vec());
        let h = harness(transport, false);

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;

        assert_eq!(outcome.status, CheckStatus::UpToDate);
        assert_eq!(outcome.items.len(), 1);
        assert!(outcome.items[0].fresh_install);
        assert!(outcome.is_clean());
        assert!(h.orchestrator.inventory().installed_path("osmfilter").is_file());
        assert_eq!(h.prompt.notices().len(), 1);
        assert!(h.store.get(LAST_CHECK_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_cycle() {
        let transport = FakeTransport::new()
            .with_body(
                MANIFEST_URL,
                manifest_json("0.3.2", &[("glancet", b"g"), ("osmconvert", b"c"), ("osmfilter", b"f")]),
            )
            .with_body(&command_url("glancet"), b"g".to_vec())
            .with_body(&command_url("osmfilter"), b"f".to_vec());
        let h = harness(transport, false);

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;

        assert_eq!(outcome.status, CheckStatus::UpToDate);
        let failed: Vec<_> = outcome.failed_items().map(|i| i.command.as_str()).collect();
        let updated: Vec<_> = outcome.updated_items().map(|i| i.command.as_str()).collect();
        assert_eq!(failed, vec!["osmconvert"]);
        assert_eq!(updated, vec!["glancet", "osmfilter"]);
        assert!(!outcome.is_clean());
        assert!(!outcome.has_severe());
    }

    #[tokio::test]
    async fn test_fetch_failure_notifies_once_and_touches_nothing() {
        let h = harness(FakeTransport::new(), false);
        let dir = h.orchestrator.inventory().commands_dir().to_path_buf();
        write_command(&dir, "glancet", b"old");

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;

        assert!(matches!(outcome.status, CheckStatus::Failed(OsmfluxError::ManifestFetch { .. })));
        assert!(outcome.items.is_empty());
        assert_eq!(h.prompt.notices().len(), 1);
        assert_eq!(h.prompt.notices()[0].2, NoticeLevel::Error);
        assert_eq!(std::fs::read(dir.join("glancet")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_automatic_check_respects_gate() {
        let transport = FakeTransport::new()
            .with_body(MANIFEST_URL, manifest_json("0.3.2", &[]));
        let handle = transport.clone();
        let h = harness(transport, false);
        let recent = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        h.store.set(LAST_CHECK_KEY, &recent).await.unwrap();

        let outcome = h.orchestrator.run_check(Trigger::Automatic).await;

        assert!(matches!(outcome.status, CheckStatus::Skipped { next_check_at: Some(_) }));
        assert!(handle.requests().is_empty());

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;
        assert_eq!(outcome.status, CheckStatus::UpToDate);
        assert_eq!(handle.requests().len(), 1);
        // Automatic up-to-date checks stay silent; the manual one notified once
        assert_eq!(h.prompt.notices().len(), 1);
        // The manual check did not move the automatic schedule
        assert_eq!(h.store.get(LAST_CHECK_KEY).await.unwrap(), Some(recent));
    }

    #[tokio::test]
    async fn test_version_change_accepted_installs_and_restarts() {
        let transport =
            FakeTransport::new().with_body(MANIFEST_URL, manifest_json("0.4.0", &[]));
        let h = harness(transport, true);

        let outcome = h.orchestrator.run_check(Trigger::Automatic).await;

        assert_eq!(
            outcome.status,
            CheckStatus::RestartRequired {
                latest_version: "0.4.0".to_string(),
                accepted: true,
            }
        );
        assert_eq!(h.installer.installed_versions(), vec!["0.4.0".to_string()]);
        assert_eq!(h.installer.restarts(), 1);
    }

    #[tokio::test]
    async fn test_version_change_declined_keeps_command_updates() {
        let transport = FakeTransport::new()
            .with_body(MANIFEST_URL, manifest_json("0.4.0", &[("osmfilter", b"new")]))
            .with_body(&command_url("osmfilter"), b"new".to_vec());
        let h = harness(transport, false);
        let dir = h.orchestrator.inventory().commands_dir().to_path_buf();
        write_command(&dir, "osmfilter", b"old");

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;

        assert!(matches!(outcome.status, CheckStatus::RestartRequired { accepted: false, .. }));
        assert_eq!(std::fs::read(dir.join("osmfilter")).unwrap(), b"new");
        assert!(h.installer.installed_versions().is_empty());
        assert_eq!(h.installer.restarts(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_check_is_busy() {
        let h = harness(FakeTransport::new(), false);
        let held = RunningGuard::acquire(&h.orchestrator.running).unwrap();

        let outcome = h.orchestrator.run_check(Trigger::Manual).await;
        assert_eq!(outcome.status, CheckStatus::Busy);
        assert!(h.prompt.notices().is_empty());

        drop(held);
        assert!(!h.orchestrator.is_busy());
    }
}
