// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection health probes and daemon auto-start.
//!
//! The connection runs these every five minutes (and on demand when
//! reconnection exhausts its attempts) to decide whether to switch
//! transports or to start the daemon itself.

use crate::direct::DirectTransport;
use ghost_bus::Bus;
use ghost_core::config as core_config;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Which probes to run.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticRequest {
    pub check_broker: bool,
    pub check_daemon: bool,
    pub check_network: bool,
    pub check_permissions: bool,
}

impl Default for DiagnosticRequest {
    fn default() -> Self {
        Self { check_broker: true, check_daemon: true, check_network: true, check_permissions: true }
    }
}

/// Probe results plus the recommendations derived from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDiagnosticResults {
    pub is_broker_available: bool,
    pub is_daemon_running: bool,
    pub is_network_ok: bool,
    pub has_required_permissions: bool,
    pub can_use_fallback: bool,
    pub can_auto_start_daemon: bool,
    pub diagnostic_message: String,
    pub recommended_actions: Vec<String>,
}

pub struct Diagnostics {
    bus: Bus,
    fallback: Option<Arc<dyn DirectTransport>>,
    state_dir: PathBuf,
    auto_start_daemon: bool,
}

impl Diagnostics {
    pub fn new(
        bus: Bus,
        fallback: Option<Arc<dyn DirectTransport>>,
        state_dir: PathBuf,
        auto_start_daemon: bool,
    ) -> Self {
        Self { bus, fallback, state_dir, auto_start_daemon }
    }

    /// Run the requested probes and derive recommendations.
    pub async fn run(&self, request: DiagnosticRequest) -> ConnectionDiagnosticResults {
        let mut results = ConnectionDiagnosticResults {
            can_auto_start_daemon: self.auto_start_daemon,
            ..Default::default()
        };

        if request.check_broker {
            results.is_broker_available = self.bus.is_available().await;
        }
        if request.check_daemon {
            results.is_daemon_running = self.is_daemon_process_running();
        }
        results.can_use_fallback = match &self.fallback {
            Some(transport) => transport.test_connection().await,
            None => false,
        };
        if request.check_network {
            // Either path reaching the daemon side means the network is fine.
            results.is_network_ok = results.is_broker_available || results.can_use_fallback;
        }
        if request.check_permissions {
            results.has_required_permissions = self.state_dir_writable();
        }

        let mut actions = Vec::new();
        if !results.is_broker_available {
            if results.can_use_fallback {
                actions.push("broker unreachable; switching to the direct socket".to_string());
            } else {
                actions.push("broker unreachable and no fallback configured".to_string());
            }
        }
        if !results.is_daemon_running {
            if results.can_auto_start_daemon {
                actions.push("daemon not running; attempting auto-start".to_string());
            } else {
                actions.push("daemon not running; start ghostd".to_string());
            }
        }
        if !results.has_required_permissions {
            actions.push(format!(
                "state dir {} is not writable",
                self.state_dir.display()
            ));
        }

        results.diagnostic_message = if actions.is_empty() {
            "all probes passed".to_string()
        } else {
            actions.join("; ")
        };
        results.recommended_actions = actions;
        results
    }

    /// Whether a ghostd process currently holds the pid file.
    pub fn is_daemon_process_running(&self) -> bool {
        let pid_path = self.state_dir.join(core_config::PID_FILE);
        let Ok(text) = std::fs::read_to_string(&pid_path) else {
            return false;
        };
        let Ok(pid) = text.trim().parse::<u32>() else {
            return false;
        };
        process_alive(pid)
    }

    /// Spawn a detached daemon. Returns whether the spawn succeeded; the
    /// caller re-probes to learn when it is actually serving.
    pub fn try_start_daemon(&self) -> bool {
        if !self.auto_start_daemon {
            return false;
        }
        let binary = daemon_binary(&self.state_dir);
        match std::process::Command::new(&binary)
            .env(core_config::ENV_INSTALL, &self.state_dir)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(child) => {
                info!(binary = %binary.display(), pid = child.id(), "started daemon");
                true
            }
            Err(e) => {
                warn!(binary = %binary.display(), error = %e, "daemon auto-start failed");
                false
            }
        }
    }

    fn state_dir_writable(&self) -> bool {
        let probe = self.state_dir.join(".perm-probe");
        match std::fs::write(&probe, b"") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }
}

/// Daemon binary: `{install}/bin/ghostd` when present, else `ghostd` on PATH.
fn daemon_binary(state_dir: &std::path::Path) -> PathBuf {
    let installed = state_dir.join("bin").join("ghostd");
    if installed.is_file() {
        installed
    } else {
        PathBuf::from("ghostd")
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    std::path::Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    // Without procfs, trust the pid file.
    true
}

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod tests;
