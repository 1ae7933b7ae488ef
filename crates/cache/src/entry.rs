// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stored cache envelope: value, expiry stamp, and the type name it was
//! written as.

use crate::CacheError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One cached value with its expiry and type tag.
///
/// This is also the on-disk format of [`crate::DiskCache`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    pub type_name: String,
}

impl CacheEntry {
    pub fn new(
        value: serde_json::Value,
        type_name: &str,
        expires_at_ms: Option<u64>,
    ) -> Self {
        Self { value, expires_at_ms, type_name: type_name.to_string() }
    }

    /// Expired iff an expiry is set and it is in the past.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at_ms {
            Some(at) => at < now_ms,
            None => false,
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, CacheError> {
        serde_json::from_value(self.value).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
