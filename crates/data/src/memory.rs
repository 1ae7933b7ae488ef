// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process core for broker-less configurations.
//!
//! Fully functional key/value store with TTL; SQL operations report
//! `NotImplemented` (there is no engine behind them).

use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use ghost_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

struct Stored {
    value: Vec<u8>,
    expires_at_ms: Option<u64>,
}

#[derive(Default)]
pub struct MemoryData {
    entries: Mutex<HashMap<String, Stored>>,
}

impl MemoryData {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<Vec<u8>> {
        let now = SystemClock.epoch_ms();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stored) if stored.expires_at_ms.map(|at| at < now).unwrap_or(false) => {
                entries.remove(key);
                None
            }
            Some(stored) => Some(stored.value.clone()),
            None => None,
        }
    }

    fn sql_unsupported<T>(&self) -> Result<T, DataError> {
        Err(DataError::NotImplemented("no SQL engine behind the in-memory core".into()))
    }
}

#[async_trait]
impl DataClient for MemoryData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        Ok(self.live(key))
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let expires_at_ms = ttl.map(|t| SystemClock.epoch_ms() + t.as_millis() as u64);
        self.entries.lock().insert(key.to_string(), Stored { value, expires_at_ms });
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        Ok(self.live(key).is_some())
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        Ok(keys.iter().map(|k| self.live(k)).collect())
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let expires_at_ms = ttl.map(|t| SystemClock.epoch_ms() + t.as_millis() as u64);
        let mut entries = self.entries.lock();
        for (key, value) in pairs {
            entries.insert(key, Stored { value, expires_at_ms });
        }
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.sql_unsupported()
    }

    async fn query_single(
        &self,
        _sql: &str,
        _params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.sql_unsupported()
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64, DataError> {
        self.sql_unsupported()
    }

    async fn execute_batch(&self, _statements: &[BatchStatement]) -> Result<u64, DataError> {
        self.sql_unsupported()
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        self.sql_unsupported()
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, DataError> {
        Ok(false)
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        Ok(vec![])
    }

    fn layer_names(&self) -> Vec<&'static str> {
        vec!["memory"]
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
