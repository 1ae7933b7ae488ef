// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection tuning knobs and the reconnect backoff policy.

use std::time::Duration;

/// Reconnect backoff: exponential with jitter, then a slow fixed cadence
/// once the attempt budget is spent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub multiplier: f64,
    /// Uniform jitter factor range applied to each delay
    pub jitter: (f64, f64),
    pub cap: Duration,
    /// Consecutive failures before dropping to the slow cadence
    pub max_attempts: u32,
    pub slow_cadence: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            multiplier: 1.5,
            jitter: (0.85, 1.15),
            cap: Duration::from_secs(120),
            max_attempts: 5,
            slow_cadence: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (0-based), with `jitter`
    /// sampled uniformly from the configured range.
    pub fn delay(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt >= self.max_attempts {
            return self.slow_cadence;
        }
        let exp = self.base.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = exp.min(self.cap.as_secs_f64());
        Duration::from_secs_f64(capped * jitter)
    }

    /// Sample a jitter factor from the configured range.
    pub fn sample_jitter(&self) -> f64 {
        let (lo, hi) = self.jitter;
        if hi <= lo {
            return lo;
        }
        lo + rand::random::<f64>() * (hi - lo)
    }
}

/// Configuration for one [`crate::GhostConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// This connection lives inside the daemon itself: skip the network
    /// check, registration, and reconnection entirely.
    pub daemon_self: bool,
    /// Allow the direct-socket fallback transport
    pub enable_fallback: bool,
    /// Run the periodic diagnostics probe
    pub enable_diagnostics: bool,
    /// Report heartbeats and metrics while connected
    pub auto_monitor: bool,
    /// Let diagnostics spawn the daemon when it is down
    pub auto_start_daemon: bool,
    pub heartbeat_interval: Duration,
    pub metrics_interval: Duration,
    pub diagnostics_interval: Duration,
    /// Outgoing queue capacity (drop-oldest beyond this)
    pub queue_capacity: usize,
    /// Bus ping deadline during connection checks
    pub ping_timeout: Duration,
    /// Command reply deadline
    pub command_timeout: Duration,
    /// Wait before re-checking the queue while disconnected
    pub offline_retry_delay: Duration,
    pub reconnect: ReconnectPolicy,
    /// Daemon state dir for diagnostics; resolved from the environment
    /// when unset
    pub state_dir: Option<std::path::PathBuf>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            daemon_self: false,
            enable_fallback: true,
            enable_diagnostics: true,
            auto_monitor: true,
            auto_start_daemon: false,
            heartbeat_interval: Duration::from_secs(30),
            metrics_interval: Duration::from_secs(5),
            diagnostics_interval: Duration::from_secs(5 * 60),
            queue_capacity: 1_000,
            ping_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            offline_retry_delay: Duration::from_secs(1),
            reconnect: ReconnectPolicy::default(),
            state_dir: None,
        }
    }
}

impl ConnectionConfig {
    /// Configuration for the daemon's own in-process connection.
    pub fn daemon_self() -> Self {
        Self { daemon_self: true, enable_fallback: false, ..Self::default() }
    }

    /// Derive a config from an application's option map.
    pub fn for_app(options: &ghost_core::AppOptions) -> Self {
        Self { auto_monitor: options.auto_monitor, ..Self::default() }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
