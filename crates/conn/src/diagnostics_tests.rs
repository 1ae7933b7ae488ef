// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ConnectionError;
use async_trait::async_trait;
use ghost_cache::MemoryCache;
use ghost_core::{CommandResponse, SystemCommand};

struct FakeTransport {
    reachable: bool,
}

#[async_trait]
impl DirectTransport for FakeTransport {
    async fn test_connection(&self) -> bool {
        self.reachable
    }

    async fn send_command(
        &self,
        command: &SystemCommand,
    ) -> Result<CommandResponse, ConnectionError> {
        Ok(CommandResponse::ok(command.command_id, command.timestamp_ms))
    }
}

fn diagnostics(fallback_reachable: Option<bool>, dir: &std::path::Path) -> Diagnostics {
    let bus = Bus::local(Arc::new(MemoryCache::new()));
    let fallback = fallback_reachable
        .map(|reachable| Arc::new(FakeTransport { reachable }) as Arc<dyn DirectTransport>);
    Diagnostics::new(bus, fallback, dir.to_path_buf(), false)
}

#[tokio::test]
async fn healthy_setup_passes_all_probes() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ghostd.pid"), std::process::id().to_string()).unwrap();

    let diag = diagnostics(Some(true), dir.path());
    let results = diag.run(DiagnosticRequest::default()).await;

    assert!(results.is_broker_available);
    assert!(results.is_daemon_running);
    assert!(results.is_network_ok);
    assert!(results.has_required_permissions);
    assert!(results.can_use_fallback);
    assert_eq!(results.diagnostic_message, "all probes passed");
    assert!(results.recommended_actions.is_empty());
}

#[tokio::test]
async fn dead_daemon_is_reported_with_an_action() {
    let dir = tempfile::tempdir().unwrap();
    let diag = diagnostics(None, dir.path());
    let results = diag.run(DiagnosticRequest::default()).await;

    assert!(!results.is_daemon_running);
    assert!(!results.can_use_fallback);
    assert!(results
        .recommended_actions
        .iter()
        .any(|a| a.contains("daemon not running")));
}

#[cfg(target_os = "linux")]
#[test]
fn stale_pid_file_means_not_running() {
    let dir = tempfile::tempdir().unwrap();
    // An impossible pid on Linux (pid_max is far below this)
    std::fs::write(dir.path().join("ghostd.pid"), "999999999").unwrap();

    let diag = diagnostics(None, dir.path());
    assert!(!diag.is_daemon_process_running());
}

#[test]
fn garbage_pid_file_means_not_running() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ghostd.pid"), "not a pid").unwrap();

    let diag = diagnostics(None, dir.path());
    assert!(!diag.is_daemon_process_running());
}

#[test]
fn auto_start_disabled_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let diag = diagnostics(None, dir.path());
    assert!(!diag.try_start_daemon());
}
