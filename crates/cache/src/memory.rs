// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory cache backend.

use crate::{Cache, CacheEntry, CacheError};
use async_trait::async_trait;
use ghost_core::{Clock, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Concurrent-map cache with lazy expiry.
///
/// Expired entries are dropped on read; [`purge_expired`](Self::purge_expired)
/// reclaims the rest when a caller wants bounded memory.
pub struct MemoryCache<C: Clock = SystemClock> {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: C,
}

impl MemoryCache<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryCache<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryCache<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl<C: Clock> Cache for MemoryCache<C> {
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now_ms) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.clone())),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        type_name: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at_ms = ttl.map(|t| self.clock.epoch_ms() + t.as_millis() as u64);
        let entry = CacheEntry::new(value, type_name, expires_at_ms);
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let entries = self.entries.lock();
        Ok(entries.get(key).map(|e| !e.is_expired(now_ms)).unwrap_or(false))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let now_ms = self.clock.epoch_ms();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now_ms) => {
                entry.expires_at_ms = Some(now_ms + ttl.as_millis() as u64);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
