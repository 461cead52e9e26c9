//! Complete update cycles against in-memory collaborators.

use crate::common::{FileAssert, TestInstall};
use chrono::{Duration as ChronoDuration, Utc};
use osmflux::core::OsmfluxError;
use osmflux::host::{ChmodMarker, ExecutableMarker, KeyValueStore, NoticeLevel};
use osmflux::test_utils::{
    BackupLosingMarker, FailingMarker, FakeTransport, MemoryStore, RecordingInstaller, ScriptedPrompt, zip_archive,
};
use osmflux::update::cadence::LAST_CHECK_KEY;
use osmflux::update::{
    BundleConfig, BundleStatus, Channel, CheckStatus, Collaborators, CommandInventory,
    ContentHasher, DigestAlgorithm, InstallMode, ReleaseEndpoint, Trigger, UpdateOrchestrator,
};
use osmflux::utils::platform::{Arch, Os, PlatformKey};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const BASE: &str = "https://static.example.com/osmflux";
const VERSION: &str = "0.3.2";

fn linux() -> PlatformKey {
    PlatformKey::new(Os::Linux, Arch::X64)
}

fn manifest_url(channel: Channel) -> String {
    format!("{BASE}/releases/{channel}/latest/update_manifest.json")
}

fn command_url(channel: Channel, name: &str) -> String {
    format!("{BASE}/releases/{channel}/latest/commands/{name}/linux/x64/{name}")
}

fn md5(bytes: &[u8]) -> String {
    ContentHasher::digest(DigestAlgorithm::Md5, bytes).as_hex().to_string()
}

/// Manifest publishing `commands` for linux/x64 only.
fn manifest(version: &str, commands: &[(&str, &[u8])]) -> Vec<u8> {
    let mut published = serde_json::Map::new();
    for (name, content) in commands {
        published.insert(
            (*name).to_string(),
            json!({ "linux": { "x64": md5(content) }, "darwin": { "arm64": md5(b"other") } }),
        );
    }
    serde_json::to_vec(&json!({
        "applicationId": "com.mogita.osmflux",
        "version": version,
        "resourcesURL": format!("{BASE}/releases/stable/latest/resources.neu"),
        "data": { "commands": published }
    }))
    .unwrap()
}

/// Fakes for one installation plus the knobs a scenario may turn.
struct Cycle {
    install: TestInstall,
    transport: FakeTransport,
    store: MemoryStore,
    prompt: ScriptedPrompt,
    installer: RecordingInstaller,
    marker: Arc<dyn ExecutableMarker>,
    mode: InstallMode,
    channel: Channel,
    bundles: Vec<BundleConfig>,
}

impl Cycle {
    fn new(transport: FakeTransport) -> Self {
        Self {
            install: TestInstall::new().unwrap(),
            transport,
            store: MemoryStore::new(),
            prompt: ScriptedPrompt::answering(false),
            installer: RecordingInstaller::new(),
            marker: Arc::new(ChmodMarker),
            mode: InstallMode::Production,
            channel: Channel::Stable,
            bundles: Vec::new(),
        }
    }

    fn orchestrator(&self) -> UpdateOrchestrator {
        let collaborators = Collaborators {
            transport: Arc::new(self.transport.clone()),
            store: Arc::new(self.store.clone()),
            prompt: Arc::new(self.prompt.clone()),
            installer: Arc::new(self.installer.clone()),
            marker: Arc::clone(&self.marker),
        };
        let inventory = CommandInventory::new(self.install.commands_dir(), self.mode, linux());
        UpdateOrchestrator::new(
            collaborators,
            inventory,
            ReleaseEndpoint::new(BASE, self.channel),
            VERSION,
        )
        .with_bundles(self.bundles.clone())
    }

    fn command(&self, name: &str) -> PathBuf {
        self.install.commands_dir().join(name)
    }
}

#[tokio::test]
async fn fresh_install_downloads_verifies_and_marks_executable() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[("osmfilter", b"D1 bytes")]))
        .with_body(&command_url(Channel::Stable, "osmfilter"), b"D1 bytes".to_vec());
    let cycle = Cycle::new(transport);

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert_eq!(outcome.status, CheckStatus::UpToDate);
    assert_eq!(outcome.items.len(), 1);
    assert!(outcome.items[0].fresh_install);
    assert!(outcome.is_clean());
    FileAssert::contents(cycle.command("osmfilter"), b"D1 bytes");
    FileAssert::not_exists(cycle.command("osmfilter.bak"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(cycle.command("osmfilter")).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "command should be executable");
    }
}

#[tokio::test]
async fn up_to_date_command_is_never_downloaded() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[("osmconvert", b"same")]));
    let cycle = Cycle::new(transport.clone());
    cycle.install.add_command("osmconvert", b"same").unwrap();

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert!(outcome.items.is_empty());
    assert_eq!(transport.requests().len(), 1, "only the manifest is fetched");
    assert!(transport.requests()[0].contains("update_manifest.json?ts="));
}

#[tokio::test]
async fn corrupted_download_rolls_back_to_previous_binary() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[("glancet", b"D1")]))
        .with_body(&command_url(Channel::Stable, "glancet"), b"D2 truncated".to_vec());
    let cycle = Cycle::new(transport);
    cycle.install.add_command("glancet", b"D0").unwrap();

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    let report = &outcome.items[0];
    assert!(matches!(report.result, Err(OsmfluxError::IntegrityMismatch { .. })));
    assert_eq!(md5(&std::fs::read(cycle.command("glancet")).unwrap()), md5(b"D0"));
    FileAssert::not_exists(cycle.command("glancet.bak"));
}

#[tokio::test]
async fn every_failure_injection_restores_original_digest() {
    let injections: Vec<(&str, Option<&[u8]>, bool)> = vec![
        ("download", None, false),
        ("integrity", Some(&b"garbage"[..]), false),
        ("permissions", Some(&b"D1"[..]), true),
    ];

    for (label, body, failing_marker) in injections {
        let mut transport = FakeTransport::new()
            .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[("osmfilter", b"D1")]));
        if let Some(body) = body {
            transport = transport.with_body(&command_url(Channel::Stable, "osmfilter"), body.to_vec());
        }
        let mut cycle = Cycle::new(transport);
        if failing_marker {
            cycle.marker = Arc::new(FailingMarker);
        }
        cycle.install.add_command("osmfilter", b"D0").unwrap();

        let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

        assert_eq!(outcome.failed_items().count(), 1, "{label}: item should fail");
        assert!(!outcome.has_severe(), "{label}: rollback should succeed");
        FileAssert::contents(cycle.command("osmfilter"), b"D0");
    }
}

#[tokio::test]
async fn partial_batch_failure_keeps_going() {
    let transport = FakeTransport::new()
        .with_body(
            &manifest_url(Channel::Stable),
            manifest(VERSION, &[("glancet", b"one"), ("osmconvert", b"two"), ("osmfilter", b"three")]),
        )
        .with_body(&command_url(Channel::Stable, "glancet"), b"one".to_vec())
        .with_body(&command_url(Channel::Stable, "osmfilter"), b"three".to_vec());
    let cycle = Cycle::new(transport);

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert_eq!(outcome.status, CheckStatus::UpToDate);
    let results: Vec<(&str, bool)> =
        outcome.items.iter().map(|i| (i.command.as_str(), i.succeeded())).collect();
    assert_eq!(results, vec![("glancet", true), ("osmconvert", false), ("osmfilter", true)]);
    assert!(matches!(outcome.items[1].result, Err(OsmfluxError::DownloadFailed { .. })));
    assert!(!outcome.is_clean());
    FileAssert::not_exists(cycle.command("osmconvert"));
}

#[tokio::test]
async fn concurrent_check_is_reported_busy() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[]))
        .with_delay(Duration::from_millis(50));
    let cycle = Cycle::new(transport.clone());
    let orchestrator = cycle.orchestrator();

    let (first, second) =
        tokio::join!(orchestrator.run_check(Trigger::Manual), orchestrator.run_check(Trigger::Manual));

    assert_eq!(first.status, CheckStatus::UpToDate);
    assert_eq!(second.status, CheckStatus::Busy);
    assert_eq!(transport.requests().len(), 1);
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn automatic_check_follows_twelve_hour_cadence() {
    let transport =
        FakeTransport::new().with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[]));
    let cycle = Cycle::new(transport.clone());
    let orchestrator = cycle.orchestrator();

    let recent = (Utc::now() - ChronoDuration::hours(11) - ChronoDuration::minutes(59)).to_rfc3339();
    cycle.store.set(LAST_CHECK_KEY, &recent).await.unwrap();
    let outcome = orchestrator.run_check(Trigger::Automatic).await;
    assert!(matches!(outcome.status, CheckStatus::Skipped { .. }));
    assert!(transport.requests().is_empty());

    let stale = (Utc::now() - ChronoDuration::hours(12) - ChronoDuration::seconds(1)).to_rfc3339();
    cycle.store.set(LAST_CHECK_KEY, &stale).await.unwrap();
    let outcome = orchestrator.run_check(Trigger::Automatic).await;
    assert_eq!(outcome.status, CheckStatus::UpToDate);
    assert_eq!(transport.requests().len(), 1);

    // The successful check moved the timestamp forward, so the next start is gated again
    let outcome = orchestrator.run_check(Trigger::Automatic).await;
    assert!(matches!(outcome.status, CheckStatus::Skipped { .. }));
}

#[tokio::test]
async fn fetch_failure_is_single_error_and_touches_nothing() {
    let cycle = Cycle::new(FakeTransport::new());
    cycle.install.add_command("glancet", b"D0").unwrap();

    let outcome = cycle.orchestrator().run_check(Trigger::Automatic).await;

    assert!(matches!(outcome.status, CheckStatus::Failed(OsmfluxError::ManifestFetch { .. })));
    let notices = cycle.prompt.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].2, NoticeLevel::Error);
    FileAssert::contents(cycle.command("glancet"), b"D0");
    // The attempt still counts for the cadence
    assert!(cycle.store.get(LAST_CHECK_KEY).await.unwrap().is_some());
}

#[tokio::test]
async fn development_layout_uses_dev_channel_and_staging() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Dev), manifest(VERSION, &[("osmfilter", b"dev build 2")]))
        .with_body(&command_url(Channel::Dev, "osmfilter"), b"dev build 2".to_vec());
    let mut cycle = Cycle::new(transport.clone());
    cycle.mode = InstallMode::Development;
    cycle.channel = Channel::Dev;

    let source = cycle.install.commands_dir().join("osmfilter").join("linux").join("x64");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("osmfilter"), b"dev build 1").unwrap();

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert!(outcome.is_clean());
    assert_eq!(outcome.items.len(), 1);
    assert!(!outcome.items[0].fresh_install);
    FileAssert::contents(cycle.command("dev-only/osmfilter"), b"dev build 2");
    FileAssert::contents(source.join("osmfilter"), b"dev build 1");
    assert!(transport.requests()[0].contains("/releases/dev/"));
}

#[tokio::test]
async fn missing_bundle_is_installed_after_commands() {
    let archive = zip_archive(&[("osmosis/bin/osmosis", b"#!/bin/sh\n"), ("osmosis/lib/osmosis.jar", b"jar")]);
    let bundle_url = format!("{BASE}/bundles/osmosis.zip");
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[]))
        .with_body(&bundle_url, archive);
    let mut cycle = Cycle::new(transport);
    cycle.bundles = vec![BundleConfig {
        name: "osmosis".to_string(),
        url: bundle_url,
        entry: PathBuf::from("osmosis/bin/osmosis"),
    }];

    let orchestrator = cycle.orchestrator();
    let outcome = orchestrator.run_check(Trigger::Manual).await;
    assert_eq!(outcome.bundles.len(), 1);
    assert_eq!(outcome.bundles[0].result, Ok(BundleStatus::Installed));
    FileAssert::exists(cycle.command("osmosis/lib/osmosis.jar"));

    let outcome = orchestrator.run_check(Trigger::Manual).await;
    assert_eq!(outcome.bundles[0].result, Ok(BundleStatus::AlreadyPresent));
}

#[tokio::test]
async fn new_application_version_prompts_and_failed_install_is_reported() {
    let transport =
        FakeTransport::new().with_body(&manifest_url(Channel::Stable), manifest("0.4.0", &[]));
    let mut cycle = Cycle::new(transport);
    cycle.prompt = ScriptedPrompt::answering(true);
    cycle.installer = RecordingInstaller::failing();

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert!(matches!(outcome.status, CheckStatus::Failed(OsmfluxError::Other { .. })));
    assert_eq!(cycle.prompt.confirmations().len(), 1);
    assert!(cycle.prompt.confirmations()[0].contains("0.4.0"));
    assert_eq!(cycle.installer.restarts(), 0);
}

#[tokio::test]
async fn failed_rollback_is_reported_as_severe() {
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[("osmfilter", b"D1"), ("glancet", b"G1")]))
        .with_body(&command_url(Channel::Stable, "osmfilter"), b"D1".to_vec())
        .with_body(&command_url(Channel::Stable, "glancet"), b"G1".to_vec());
    let mut cycle = Cycle::new(transport);
    cycle.marker = Arc::new(BackupLosingMarker);
    cycle.install.add_command("osmfilter", b"D0").unwrap();
    cycle.install.add_command("glancet", b"G0").unwrap();

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;

    assert_eq!(outcome.status, CheckStatus::UpToDate);
    assert_eq!(outcome.items.len(), 2, "the batch continues after a failed rollback");
    assert!(outcome.items.iter().all(|i| matches!(i.result, Err(OsmfluxError::RollbackFailed { .. }))));
    assert!(outcome.has_severe());
    assert!(!outcome.is_clean());
}

#[tokio::test]
async fn development_bundle_survives_restaging() {
    let bundle_url = format!("{BASE}/bundles/osmosis.zip");
    let transport = FakeTransport::new()
        .with_body(&manifest_url(Channel::Dev), manifest(VERSION, &[]))
        .with_body(&bundle_url, zip_archive(&[("osmosis/bin/osmosis", b"#!/bin/sh\n")]));
    let mut cycle = Cycle::new(transport.clone());
    cycle.mode = InstallMode::Development;
    cycle.channel = Channel::Dev;
    cycle.bundles = vec![BundleConfig {
        name: "osmosis".to_string(),
        url: bundle_url.clone(),
        entry: PathBuf::from("osmosis/bin/osmosis"),
    }];

    let orchestrator = cycle.orchestrator();
    let first = orchestrator.run_check(Trigger::Manual).await;
    assert_eq!(first.bundles[0].result, Ok(BundleStatus::Installed));
    FileAssert::exists(cycle.command("osmosis/bin/osmosis"));

    let second = orchestrator.run_check(Trigger::Manual).await;
    assert_eq!(second.bundles[0].result, Ok(BundleStatus::AlreadyPresent));
    assert_eq!(transport.requests().iter().filter(|url| **url == bundle_url).count(), 1);
}

#[tokio::test]
async fn manual_check_does_not_move_automatic_schedule() {
    let transport =
        FakeTransport::new().with_body(&manifest_url(Channel::Stable), manifest(VERSION, &[]));
    let cycle = Cycle::new(transport);

    let outcome = cycle.orchestrator().run_check(Trigger::Manual).await;
    assert_eq!(outcome.status, CheckStatus::UpToDate);
    assert!(cycle.store.get(LAST_CHECK_KEY).await.unwrap().is_none());

    let outcome = cycle.orchestrator().run_check(Trigger::Automatic).await;
    assert_eq!(outcome.status, CheckStatus::UpToDate);
    assert!(cycle.store.get(LAST_CHECK_KEY).await.unwrap().is_some());
}
