// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack composition flags and layer tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry tuning for the resilient layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Also retry SQL writes. Off unless the caller knows its statements
    /// are idempotent.
    pub retry_sql_writes: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 100, retry_sql_writes: false }
    }
}

/// Circuit breaker thresholds, one breaker per operation category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 2, open_timeout_ms: 10_000 }
    }
}

impl BreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Which layers to compose, and their knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub enable_metrics: bool,
    pub enable_retry: bool,
    pub use_l1_cache: bool,
    pub enable_encryption: bool,
    /// Base64-encoded 32-byte key, or a passphrase to hash
    pub encryption_key: Option<String>,
    /// L1 entry TTL
    pub cache_ttl_ms: u64,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
    /// SQL backend; in-memory core when absent
    pub postgres_connection: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            enable_retry: true,
            use_l1_cache: true,
            enable_encryption: false,
            encryption_key: None,
            cache_ttl_ms: 30_000,
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            postgres_connection: None,
        }
    }
}

impl DataConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Stack config from the platform config: Postgres when configured.
    pub fn from_ghost(ghost: &ghost_core::GhostConfig) -> Self {
        Self { postgres_connection: ghost.postgres_connection.clone(), ..Self::default() }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
