// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process resource sampling for the metrics timer.
//!
//! CPU is the usage since the previous refresh, divided by core count and
//! clamped to [0, 100]. Samples taken less than 100 ms apart (or before
//! any baseline exists) report 0: too little wall-clock time for a
//! meaningful delta.

use ghost_core::{Clock, ProcessId, ProcessMetrics, SystemClock};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Minimum interval between meaningful CPU readings.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

struct SamplerState {
    system: System,
    last_refresh: Option<Instant>,
}

pub struct MetricsSampler<C: Clock = SystemClock> {
    state: Mutex<SamplerState>,
    pid: Option<sysinfo::Pid>,
    cores: f64,
    clock: C,
}

impl MetricsSampler<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MetricsSampler<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MetricsSampler<C> {
    pub fn with_clock(clock: C) -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as f64;
        Self {
            state: Mutex::new(SamplerState { system: System::new(), last_refresh: None }),
            pid: sysinfo::get_current_pid().ok(),
            cores,
            clock,
        }
    }

    /// Take one sample for this process.
    pub fn sample(&self, process_id: &ProcessId) -> ProcessMetrics {
        let now_ms = self.clock.epoch_ms();
        let mut metrics = ProcessMetrics::zero(process_id.clone(), now_ms);

        let Some(pid) = self.pid else {
            return metrics;
        };

        let now = self.clock.now();
        let mut state = self.state.lock();

        let interval_ok = match state.last_refresh {
            Some(prev) => now.saturating_duration_since(prev) >= MIN_SAMPLE_INTERVAL,
            // First reading establishes the baseline; CPU stays 0.
            None => false,
        };

        state.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );

        if let Some(process) = state.system.process(pid) {
            if interval_ok {
                let raw = process.cpu_usage() as f64 / self.cores;
                metrics.cpu_percentage = raw.clamp(0.0, 100.0);
            }
            metrics.memory_bytes = process.memory();
            metrics.thread_count =
                process.tasks().map(|tasks| tasks.len() as u32).unwrap_or(0).max(1);
        }
        metrics.handle_count = open_handle_count();
        state.last_refresh = Some(now);

        metrics
    }
}

/// Open file-descriptor count for this process.
#[cfg(target_os = "linux")]
fn open_handle_count() -> u32 {
    std::fs::read_dir("/proc/self/fd").map(|dir| dir.count() as u32).unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn open_handle_count() -> u32 {
    0
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
