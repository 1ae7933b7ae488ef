// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Disk-backed cache: one file per key.
//!
//! Filename is the URL-safe base64 of the key's SHA-256, so arbitrary keys
//! map to safe paths. Writes go through a temp file and an atomic rename;
//! a per-key lock serializes writers. A background sweeper deletes expired
//! entries and unused per-key locks every five minutes.

use crate::{Cache, CacheEntry, CacheError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ghost_core::{Clock, SystemClock};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Sweep cadence for expired entries and stale locks.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

const FILE_EXT: &str = "json";

pub struct DiskCache<C: Clock = SystemClock> {
    root: PathBuf,
    /// Per-key write locks, keyed by encoded filename
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Guards sweep and clear against each other
    maintenance: AsyncMutex<()>,
    clock: C,
    cancel: CancellationToken,
}

impl DiskCache<SystemClock> {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::open_with_clock(root, SystemClock)
    }
}

impl<C: Clock> DiskCache<C> {
    pub fn open_with_clock(root: impl Into<PathBuf>, clock: C) -> Result<Self, CacheError> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| CacheError::operation(&root.display().to_string(), e))?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
            maintenance: AsyncMutex::new(()),
            clock,
            cancel: CancellationToken::new(),
        })
    }

    /// Spawn the periodic sweeper. Runs until [`close`](Self::close).
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so open+sweep don't race.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        match cache.sweep_expired().await {
                            Ok(removed) if removed > 0 => {
                                debug!(removed, "disk cache sweep removed expired entries");
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "disk cache sweep failed"),
                        }
                    }
                }
            }
        });
    }

    /// Stop the sweeper. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Delete expired entries and drop per-key locks nobody holds.
    /// Returns the number of entries removed.
    pub async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let _guard = self.maintenance.lock().await;
        let now_ms = self.clock.epoch_ms();
        let mut removed = 0usize;

        let dir = std::fs::read_dir(&self.root)
            .map_err(|e| CacheError::operation(&self.root.display().to_string(), e))?;
        for item in dir.flatten() {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXT) {
                continue;
            }
            match read_entry(&path) {
                Ok(Some(entry)) if entry.is_expired(now_ms) => {
                    if std::fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // Unreadable entries are dropped rather than kept forever.
                    warn!(path = %path.display(), error = %e, "removing unreadable cache entry");
                    let _ = std::fs::remove_file(&path);
                }
            }
        }

        // Locks with no outside holder are reclaimable.
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);

        Ok(removed)
    }

    fn encode_key(key: &str) -> String {
        let digest = Sha256::digest(key.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", Self::encode_key(key), FILE_EXT))
    }

    fn key_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let encoded = Self::encode_key(key);
        Arc::clone(self.locks.lock().entry(encoded).or_default())
    }

    fn write_entry(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let tmp = self.root.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let bytes =
            serde_json::to_vec(entry).map_err(|e| CacheError::Serialization(e.to_string()))?;
        std::fs::write(&tmp, bytes).map_err(|e| CacheError::operation(key, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            CacheError::operation(key, e)
        })
    }
}

fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Serialization(e.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::operation(&path.display().to_string(), e)),
    }
}

#[async_trait]
impl<C: Clock> Cache for DiskCache<C> {
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        match read_entry(&path)? {
            Some(entry) if entry.is_expired(self.clock.epoch_ms()) => {
                // Lazy expiry; the sweeper would get it eventually.
                let lock = self.key_lock(key);
                let _guard = lock.lock().await;
                let _ = std::fs::remove_file(&path);
                Ok(None)
            }
            other => Ok(other),
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
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.write_entry(key, &entry)
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::operation(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        match read_entry(&self.path_for(key))? {
            Some(entry) => Ok(!entry.is_expired(self.clock.epoch_ms())),
            None => Ok(false),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        let now_ms = self.clock.epoch_ms();
        match read_entry(&self.path_for(key))? {
            Some(mut entry) if !entry.is_expired(now_ms) => {
                entry.expires_at_ms = Some(now_ms + ttl.as_millis() as u64);
                self.write_entry(key, &entry)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let _guard = self.maintenance.lock().await;
        let dir = std::fs::read_dir(&self.root)
            .map_err(|e| CacheError::operation(&self.root.display().to_string(), e))?;
        for item in dir.flatten() {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) == Some(FILE_EXT) {
                let _ = std::fs::remove_file(&path);
            }
        }
        self.locks.lock().clear();
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.root.is_dir()
    }
}

impl<C: Clock> Drop for DiskCache<C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "disk_tests.rs"]
mod tests;
