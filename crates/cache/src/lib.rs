// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost-cache: key/value store with TTL.
//!
//! Two interchangeable backends: [`MemoryCache`] (concurrent map) and
//! [`DiskCache`] (one file per key, atomic writes, periodic sweep). The
//! bus uses a cache for at-rest message persistence; the data layer uses
//! one as its read-through L1.
//!
//! Missing keys are `Ok(None)`, never an error.

mod disk;
mod entry;
mod memory;

pub use disk::DiskCache;
pub use entry::CacheEntry;
pub use memory::MemoryCache;

use async_trait::async_trait;
use ghost_core::GhostError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Cache backend errors. Lookups that find nothing are not errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("storage operation failed on {key}: {message}")]
    Operation { key: String, message: String },

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CacheError {
    pub(crate) fn operation(key: &str, err: impl std::fmt::Display) -> Self {
        CacheError::Operation { key: key.to_string(), message: err.to_string() }
    }
}

impl From<CacheError> for GhostError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Operation { .. } => GhostError::StorageOperationFailed(err.to_string()),
            CacheError::Serialization(msg) => GhostError::Serialization(msg),
        }
    }
}

/// A mapping from opaque string keys to typed values with optional TTL.
///
/// Backends store [`CacheEntry`] envelopes, stamp `expires_at_ms` from
/// their own clock, and apply expiry lazily on read. The typed helpers
/// live on [`CacheExt`].
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch the live (non-expired) entry for a key.
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Upsert, overwriting any previous value and TTL.
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        type_name: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Remove; returns whether a value existed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Presence test without deserialization.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Re-stamp the TTL; returns false if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remove all entries.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Liveness probe (meaningful for remote/disk backends).
    async fn is_available(&self) -> bool;
}

/// Typed convenience layer over any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get_entry(key).await? {
            Some(entry) => Ok(Some(entry.decode()?)),
            None => Ok(None),
        }
    }

    async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.put(key, value, std::any::type_name::<T>(), ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
