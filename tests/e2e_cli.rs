//! CLI end-to-end tests
//!
//! Tests for the reelstream command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the reelstream binary
#[allow(deprecated)]
fn reelstream_cmd() -> Command {
    Command::cargo_bin("reelstream").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = reelstream_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = reelstream_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelstream"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = reelstream_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_start_help() {
    let mut cmd = reelstream_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the streaming server"))
        .stdout(predicate::str::contains("--root"));
}

#[test]
fn test_cli_check_tools_reports_missing_transcoder() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[transcode]
ffmpeg_path = "/nonexistent/bin/ffmpeg"
"#,
    )
    .unwrap();

    let mut cmd = reelstream_cmd();
    cmd.args(["--config", config_file.to_str().unwrap(), "check-tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✗ ffmpeg"))
        .stdout(predicate::str::contains("Some tools are missing"));
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let media = temp.path().join("media");
    fs::create_dir(&media).unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        format!(
            r#"
[server]
host = "127.0.0.1"
port = 9191

[library]
roots = ["{}"]

[transcode]
preset = "fast"
max_concurrent = 3
"#,
            media.display()
        ),
    )
    .unwrap();

    let mut cmd = reelstream_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("127.0.0.1:9191"))
        .stdout(predicate::str::contains("Media roots: 1"))
        .stdout(predicate::str::contains("preset fast, max 3 concurrent"));
}

#[test]
fn test_cli_validate_rejects_bad_preset() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[transcode]
preset = "warp-speed"
"#,
    )
    .unwrap();

    let mut cmd = reelstream_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("warp-speed"));
}

#[test]
fn test_cli_start_invalid_port() {
    let mut cmd = reelstream_cmd();
    cmd.args(["start", "--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_cli_start_rejects_port_zero() {
    let temp = tempdir().unwrap();
    let mut cmd = reelstream_cmd();
    cmd.args([
        "start",
        "--port",
        "0",
        "--root",
        temp.path().to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("port cannot be 0"));
}
