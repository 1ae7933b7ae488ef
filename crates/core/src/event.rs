// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System events broadcast on `ghost:events` and `ghost:events:{id}`.
//!
//! Serializes with `{"type": "process.started", ...fields}` format.
//! Unknown type tags deserialize to `Custom` so old daemons tolerate new
//! event kinds.

use crate::id::ProcessId;
use serde::{Deserialize, Serialize};

/// Events describing process and daemon lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemEvent {
    #[serde(rename = "process.registered")]
    ProcessRegistered {
        process_id: ProcessId,
        /// Serialized [`crate::ProcessRegistration`] blob
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        data: Vec<u8>,
        timestamp_ms: u64,
    },

    #[serde(rename = "process.started")]
    ProcessStarted { process_id: ProcessId, timestamp_ms: u64 },

    #[serde(rename = "process.stopped")]
    ProcessStopped {
        process_id: ProcessId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        timestamp_ms: u64,
    },

    #[serde(rename = "process.crashed")]
    ProcessCrashed {
        process_id: ProcessId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp_ms: u64,
    },

    #[serde(rename = "process.restarted")]
    ProcessRestarted { process_id: ProcessId, restart_count: u32, timestamp_ms: u64 },

    /// Restart budget exhausted; the entry will not be revived.
    #[serde(rename = "process.failed")]
    ProcessFailed { process_id: ProcessId, reason: String, timestamp_ms: u64 },

    #[serde(rename = "health.status.changed")]
    HealthStatusChanged { process_id: ProcessId, healthy: bool, timestamp_ms: u64 },

    #[serde(rename = "daemon.started")]
    DaemonStarted { process_id: ProcessId, timestamp_ms: u64 },

    #[serde(rename = "daemon.stopping")]
    DaemonStopping { process_id: ProcessId, timestamp_ms: u64 },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl SystemEvent {
    /// Wire tag of the event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            SystemEvent::ProcessRegistered { .. } => "process.registered",
            SystemEvent::ProcessStarted { .. } => "process.started",
            SystemEvent::ProcessStopped { .. } => "process.stopped",
            SystemEvent::ProcessCrashed { .. } => "process.crashed",
            SystemEvent::ProcessRestarted { .. } => "process.restarted",
            SystemEvent::ProcessFailed { .. } => "process.failed",
            SystemEvent::HealthStatusChanged { .. } => "health.status.changed",
            SystemEvent::DaemonStarted { .. } => "daemon.started",
            SystemEvent::DaemonStopping { .. } => "daemon.stopping",
            SystemEvent::Custom => "custom",
        }
    }

    /// The process this event concerns, when any.
    pub fn process_id(&self) -> Option<&ProcessId> {
        match self {
            SystemEvent::ProcessRegistered { process_id, .. }
            | SystemEvent::ProcessStarted { process_id, .. }
            | SystemEvent::ProcessStopped { process_id, .. }
            | SystemEvent::ProcessCrashed { process_id, .. }
            | SystemEvent::ProcessRestarted { process_id, .. }
            | SystemEvent::ProcessFailed { process_id, .. }
            | SystemEvent::HealthStatusChanged { process_id, .. }
            | SystemEvent::DaemonStarted { process_id, .. }
            | SystemEvent::DaemonStopping { process_id, .. } => Some(process_id),
            SystemEvent::Custom => None,
        }
    }

    /// One-line summary for structured logging.
    pub fn log_summary(&self) -> String {
        match self.process_id() {
            Some(id) => format!("{} id={}", self.type_name(), id),
            None => self.type_name().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
