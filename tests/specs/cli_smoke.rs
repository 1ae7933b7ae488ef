// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI binary smoke checks: argument surface and offline failure mode.

use assert_cmd::Command;

#[test]
fn help_lists_the_daemon_commands() {
    let output = Command::cargo_bin("ghost").unwrap().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    for subcommand in ["ping", "list", "status", "start", "stop", "restart"] {
        assert!(stdout.contains(subcommand), "--help missing {}", subcommand);
    }
}

#[test]
fn ping_without_a_daemon_fails_with_a_clear_message() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::cargo_bin("ghost")
        .unwrap()
        .env("GHOST_INSTALL", dir.path())
        .env_remove("GHOST_REDIS_CONNECTION")
        .arg("ping")
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(stderr.contains("ghostd"), "stderr was: {}", stderr);
}
