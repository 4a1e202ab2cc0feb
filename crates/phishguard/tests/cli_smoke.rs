//! CLI contract tests: argument surface, config errors, and failure output.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn phishguard() -> Command {
    let mut cmd = Command::cargo_bin("phishguard").expect("binary");
    cmd.env_remove("PHISHGUARD_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Config pointing at a loopback port nothing listens on.
fn unreachable_config() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("phishguard.toml");
    std::fs::write(
        &path,
        "[general]\nlog_level = \"error\"\n\n[relay]\nendpoint = \"http://127.0.0.1:9\"\ntimeout_ms = 500\n",
    )
    .expect("write config");
    (dir, path)
}

#[test]
fn help_lists_subcommands() {
    phishguard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("clear-history"));
}

#[test]
fn version_flag_prints_version() {
    phishguard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_config_file_is_reported_with_remediation() {
    phishguard()
        .args(["--config", "/nonexistent/phishguard.toml", "history"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"))
        .stderr(predicate::str::contains("To fix:"));
}

#[test]
fn invalid_config_value_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("phishguard.toml");
    std::fs::write(&path, "[relay]\ntimeout_ms = 0\n").expect("write config");
    phishguard()
        .arg("--config")
        .arg(&path)
        .arg("history")
        .assert()
        .failure()
        .stderr(predicate::str::contains("timeout_ms"));
}

#[test]
fn unknown_log_format_is_a_usage_error() {
    phishguard()
        .args(["--log-format", "xml", "history"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown log format"));
}

#[test]
fn scan_against_unreachable_service_fails_with_guidance() {
    let (_dir, path) = unreachable_config();
    phishguard()
        .arg("--config")
        .arg(&path)
        .args(["scan", "https://example.com/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("phishguard scan"));
}

#[test]
fn scan_rejects_relative_url() {
    let (_dir, path) = unreachable_config();
    phishguard()
        .arg("--config")
        .arg(&path)
        .args(["scan", "/just/a/path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid page url"));
}

#[test]
fn watch_with_empty_feed_still_shows_initial_verdict() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("phishguard.toml");
    std::fs::write(
        &path,
        "[general]\nlog_level = \"error\"\n\n[watcher]\ninitial_quiet_ms = 100\nnavigation_quiet_ms = 100\n\n[relay]\nendpoint = \"http://127.0.0.1:9\"\ntimeout_ms = 500\n",
    )
    .expect("write config");
    phishguard()
        .arg("--config")
        .arg(&path)
        .args(["watch", "https://mail.example.com/"])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Unable to determine risk"));
}
