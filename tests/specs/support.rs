// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario tests.

use ghost_bus::Bus;
use ghost_cache::MemoryCache;
use ghost_conn::{ConnectionConfig, ReconnectPolicy};
use ghost_daemon::ProcessManager;
use std::sync::Arc;
use std::time::Duration;

/// In-process bus over a memory cache.
pub fn local_bus() -> Bus {
    Bus::local(Arc::new(MemoryCache::new()))
}

/// A daemon side: manager with its liveness listeners, sweeper, and
/// command dispatcher running.
pub fn daemon_side(bus: &Bus) -> ProcessManager {
    let manager = ProcessManager::new(bus.clone());
    manager.spawn_tasks();
    manager
}

/// Connection tuned for test cadence.
pub fn fast_connection_config() -> ConnectionConfig {
    ConnectionConfig {
        ping_timeout: Duration::from_millis(500),
        command_timeout: Duration::from_millis(1_000),
        offline_retry_delay: Duration::from_millis(10),
        heartbeat_interval: Duration::from_millis(50),
        metrics_interval: Duration::from_millis(50),
        reconnect: ReconnectPolicy {
            base: Duration::from_millis(30),
            multiplier: 1.0,
            jitter: (1.0, 1.0),
            cap: Duration::from_millis(100),
            max_attempts: 3,
            slow_cadence: Duration::from_millis(100),
        },
        ..ConnectionConfig::default()
    }
}

/// Poll a condition with a deadline.
pub async fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
