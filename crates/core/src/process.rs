// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process model: metadata, registration snapshots, status machine,
//! externally visible snapshots, and the restart policy.

use crate::id::ProcessId;
use crate::metrics::ProcessMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What kind of process a ghost is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessType {
    /// Long-lived service, restart-eligible
    Service,
    /// One-shot application
    App,
    /// The supervising daemon itself
    Daemon,
}

impl ProcessType {
    pub fn is_service(self) -> bool {
        matches!(self, ProcessType::Service | ProcessType::Daemon)
    }
}

crate::simple_display! {
    ProcessType {
        Service => "service",
        App => "app",
        Daemon => "daemon",
    }
}

/// Immutable descriptive metadata for a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProcessType,
    pub version: String,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl ProcessMetadata {
    pub fn new(name: impl Into<String>, kind: ProcessType, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            version: version.into(),
            environment: HashMap::new(),
            configuration: HashMap::new(),
        }
    }
}

/// Registration snapshot a ghost sends to the daemon.
///
/// Derived from the process's own view of itself; the daemon's registry is
/// authoritative after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRegistration {
    pub id: ProcessId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProcessType,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub configuration: HashMap<String, String>,
}

impl ProcessRegistration {
    pub fn from_metadata(id: ProcessId, metadata: &ProcessMetadata) -> Self {
        Self {
            id,
            name: metadata.name.clone(),
            kind: metadata.kind,
            version: metadata.version.clone(),
            executable_path: std::env::current_exe().ok(),
            arguments: std::env::args().skip(1).collect(),
            working_directory: std::env::current_dir().ok(),
            environment: metadata.environment.clone(),
            configuration: metadata.configuration.clone(),
        }
    }

    /// Restart policy encoded in the registration configuration map.
    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy::from_configuration(&self.configuration)
    }
}

/// Lifecycle status of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
    Failed,
}

crate::simple_display! {
    ProcessStatus {
        Stopped => "stopped",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Crashed => "crashed",
        Failed => "failed",
    }
}

impl ProcessStatus {
    /// The process owns a live OS handle in these states.
    pub fn is_active(self) -> bool {
        matches!(self, ProcessStatus::Starting | ProcessStatus::Running | ProcessStatus::Stopping)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Legal transitions of the lifecycle state machine.
    ///
    /// `Stopped → Starting → Running → Stopping → Stopped`, with `Crashed`
    /// and `Failed` as alternative exits and restart re-entries.
    pub fn can_transition(self, to: ProcessStatus) -> bool {
        use ProcessStatus::*;
        matches!(
            (self, to),
            (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Failed)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Running, Crashed)
                | (Running, Stopped)
                | (Stopping, Stopped)
                | (Stopping, Failed)
                | (Crashed, Starting)
                | (Failed, Starting)
        )
    }
}

/// Externally visible snapshot of a registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessState {
    pub id: ProcessId,
    pub name: String,
    pub is_running: bool,
    pub is_service: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_metrics: Option<ProcessMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_ms: Option<u64>,
}

/// Per-entry restart configuration, parsed from the registration
/// configuration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub auto_restart: bool,
    /// 0 = unlimited
    pub max_restart_attempts: u32,
    pub restart_delay_ms: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self { auto_restart: false, max_restart_attempts: 0, restart_delay_ms: 5_000 }
    }
}

impl RestartPolicy {
    /// Parse from a configuration map, accepting both PascalCase and
    /// camelCase keys as they appear on the wire.
    pub fn from_configuration(configuration: &HashMap<String, String>) -> Self {
        let lookup = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| configuration.get(*k).cloned())
        };
        let defaults = Self::default();

        let auto_restart = lookup(&["AutoRestart", "autoRestart"])
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.auto_restart);
        let max_restart_attempts = lookup(&["MaxRestartAttempts", "maxRestartAttempts"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_restart_attempts);
        let restart_delay_ms = lookup(&["RestartDelayMs", "restartDelayMs"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.restart_delay_ms);

        Self { auto_restart, max_restart_attempts, restart_delay_ms }
    }

    /// Whether another restart attempt is allowed after `restarts` so far.
    pub fn allows_attempt(&self, restarts: u32) -> bool {
        self.auto_restart
            && (self.max_restart_attempts == 0 || restarts < self.max_restart_attempts)
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
