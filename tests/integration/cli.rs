//! Behaviour of the `osmflux` binary.

use crate::common::TestInstall;
use predicates::prelude::*;

#[test]
fn help_lists_commands() {
    let install = TestInstall::new().unwrap();
    install
        .osmflux()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("prefs"));
}

#[test]
fn path_prints_installed_command() {
    let install = TestInstall::new().unwrap();
    let name = if cfg!(windows) { "osmfilter.exe" } else { "osmfilter" };
    install.add_command(name, b"binary").unwrap();

    install
        .osmflux()
        .args(["path", "osmfilter"])
        .assert()
        .success()
        .stdout(predicate::str::contains(name));
}

#[test]
fn path_of_missing_command_fails() {
    let install = TestInstall::new().unwrap();

    install
        .osmflux()
        .args(["path", "glancet"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is not installed"));
}

#[test]
fn prefs_default_to_root_and_persist() {
    let install = TestInstall::new().unwrap();

    install
        .osmflux()
        .args(["prefs", "get", "opened-dir"])
        .assert()
        .success()
        .stdout("/\n");

    install.osmflux().args(["prefs", "set", "saved-dir", "/data/extracts"]).assert().success();

    install
        .osmflux()
        .args(["prefs", "get", "saved-dir"])
        .assert()
        .success()
        .stdout("/data/extracts\n");
    install.osmflux().args(["prefs", "get", "opened-dir"]).assert().success().stdout("/\n");
}

#[test]
fn status_reports_never_checked() {
    let install = TestInstall::new().unwrap();

    install
        .osmflux()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("last check: never"))
        .stdout(predicate::str::contains("channel:    stable"));
}

#[test]
fn list_json_reports_digests() {
    let install = TestInstall::new().unwrap();
    let name = if cfg!(windows) { "osmconvert.exe" } else { "osmconvert" };
    install.add_command(name, b"hello").unwrap();

    let output = install.osmflux().args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = listed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "osmconvert");
    assert_eq!(entries[0]["md5"], "5d41402abc4b2a76b9719d911017c592");
}

#[test]
fn list_without_commands() {
    let install = TestInstall::new().unwrap();

    install
        .osmflux()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No commands installed"));
}

#[test]
fn check_against_unreachable_server_fails() {
    let install = TestInstall::new().unwrap();
    install
        .write_config("base_url = \"http://127.0.0.1:9\"\n\n[update]\nrequest_timeout = 5\n")
        .unwrap();
    install.add_command("osmfilter", b"D0").unwrap();

    install
        .osmflux()
        .args(["check", "--no"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to fetch update manifest"));

    // Nothing is touched when the manifest is unavailable
    assert_eq!(std::fs::read(install.commands_dir().join("osmfilter")).unwrap(), b"D0");
}

#[test]
fn check_auto_respects_disabled_startup_checks() {
    let install = TestInstall::new().unwrap();
    install
        .write_config("base_url = \"http://127.0.0.1:9\"\n\n[update]\ncheck_on_startup = false\n")
        .unwrap();

    install.osmflux().args(["check", "--auto"]).assert().success();
}

#[cfg(unix)]
#[test]
fn run_streams_output_and_propagates_failure() {
    use std::os::unix::fs::PermissionsExt;

    let install = TestInstall::new().unwrap();
    let script = install
        .add_command("glancet", b"#!/bin/sh\necho \"glancet $1\"\nexit 0\n")
        .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    install
        .osmflux()
        .args(["run", "glancet", "--", "extract.osm.pbf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("glancet extract.osm.pbf"));

    let failing = install.add_command("osmfilter", b"#!/bin/sh\nexit 3\n").unwrap();
    std::fs::set_permissions(&failing, std::fs::Permissions::from_mode(0o755)).unwrap();

    install.osmflux().args(["run", "osmfilter"]).assert().failure().code(1);
}
