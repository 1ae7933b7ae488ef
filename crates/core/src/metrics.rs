// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat and metrics payloads shipped on `ghost:health:{id}` and
//! `ghost:metrics:{id}`.
//!
//! Both are compact binary payloads on the wire (see [`crate::codec`]).
//! Metrics are append-only samples; the daemon never mutates them.

use crate::id::ProcessId;
use serde::{Deserialize, Serialize};

/// A single resource-usage sample for a process.
///
/// The managed-heap fields are self-reported: a ghost running on a managed
/// runtime fills them in, the Rust sampler reports zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub process_id: ProcessId,
    /// Percent of total machine CPU, clamped to [0, 100]
    pub cpu_percentage: f64,
    /// Resident set size
    pub memory_bytes: u64,
    pub thread_count: u32,
    pub handle_count: u32,
    #[serde(default)]
    pub gc_total_memory: u64,
    #[serde(default)]
    pub gen0_collections: u64,
    #[serde(default)]
    pub gen1_collections: u64,
    #[serde(default)]
    pub gen2_collections: u64,
    pub timestamp_ms: u64,
}

impl ProcessMetrics {
    /// An empty sample (used before the first real reading).
    pub fn zero(process_id: ProcessId, timestamp_ms: u64) -> Self {
        Self {
            process_id,
            cpu_percentage: 0.0,
            memory_bytes: 0,
            thread_count: 0,
            handle_count: 0,
            gc_total_memory: 0,
            gen0_collections: 0,
            gen1_collections: 0,
            gen2_collections: 0,
            timestamp_ms,
        }
    }
}

/// Periodic liveness message on `ghost:health:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub id: ProcessId,
    pub status: String,
    pub timestamp_ms: u64,
    pub app_type: String,
}

impl HeartbeatMessage {
    pub fn running(id: ProcessId, app_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self { id, status: "Running".to_string(), timestamp_ms, app_type: app_type.into() }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
