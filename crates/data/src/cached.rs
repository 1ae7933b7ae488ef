// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-through L1 cache layer.
//!
//! Caches `kv_get`/`kv_exists` and `query`/`query_single` (keyed by a hash
//! of the SQL and its parameters). Key/value writes invalidate their key;
//! a successful mutating execute clears the whole SQL cache.

use crate::sql::is_mutating_sql;
use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use ghost_cache::{Cache, CacheExt, MemoryCache};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct CachedData {
    inner: Arc<dyn DataClient>,
    kv_cache: Arc<MemoryCache>,
    sql_cache: Arc<MemoryCache>,
    ttl: Duration,
}

impl CachedData {
    pub fn new(inner: Arc<dyn DataClient>, ttl: Duration) -> Self {
        Self {
            inner,
            kv_cache: Arc::new(MemoryCache::new()),
            sql_cache: Arc::new(MemoryCache::new()),
            ttl,
        }
    }

    fn sql_key(sql: &str, params: &[Value]) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine as _;
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        hasher.update(serde_json::to_vec(params).unwrap_or_default());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }

    async fn invalidate_sql(&self) {
        let _ = self.sql_cache.clear().await;
    }
}

#[async_trait]
impl DataClient for CachedData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        if let Ok(Some(hit)) = self.kv_cache.get::<Vec<u8>>(key).await {
            debug!(key, "kv cache hit");
            return Ok(Some(hit));
        }
        let value = self.inner.kv_get(key).await?;
        if let Some(bytes) = &value {
            let _ = self.kv_cache.set(key, bytes, Some(self.ttl)).await;
        }
        Ok(value)
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.inner.kv_set(key, value, ttl).await?;
        let _ = self.kv_cache.delete(key).await;
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        let existed = self.inner.kv_delete(key).await?;
        let _ = self.kv_cache.delete(key).await;
        Ok(existed)
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        // A cached value answers existence without touching the core.
        if let Ok(Some(_)) = self.kv_cache.get::<Vec<u8>>(key).await {
            return Ok(true);
        }
        self.inner.kv_exists(key).await
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        self.inner.kv_get_many(keys).await
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let keys: Vec<String> = pairs.iter().map(|(k, _)| k.clone()).collect();
        self.inner.kv_set_many(pairs, ttl).await?;
        for key in keys {
            let _ = self.kv_cache.delete(&key).await;
        }
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        let key = Self::sql_key(sql, params);
        if let Ok(Some(hit)) = self.sql_cache.get::<Vec<Value>>(&key).await {
            debug!(key = %key, "sql cache hit");
            return Ok(hit);
        }
        let rows = self.inner.query(sql, params).await?;
        let _ = self.sql_cache.set(&key, &rows, Some(self.ttl)).await;
        Ok(rows)
    }

    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        let key = format!("single:{}", Self::sql_key(sql, params));
        if let Ok(Some(hit)) = self.sql_cache.get::<Option<Value>>(&key).await {
            debug!(key = %key, "sql cache hit");
            return Ok(hit);
        }
        let row = self.inner.query_single(sql, params).await?;
        let _ = self.sql_cache.set(&key, &row, Some(self.ttl)).await;
        Ok(row)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        let affected = self.inner.execute(sql, params).await?;
        if is_mutating_sql(sql) {
            self.invalidate_sql().await;
        }
        Ok(affected)
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        let affected = self.inner.execute_batch(statements).await?;
        if statements.iter().any(|s| is_mutating_sql(&s.sql)) {
            self.invalidate_sql().await;
        }
        Ok(affected)
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        // Transactions bypass the cache; both caches drop on commit since
        // the transaction may have touched anything.
        let tx = self.inner.begin().await?;
        Ok(Box::new(CachedTransaction {
            inner: tx,
            kv_cache: Arc::clone(&self.kv_cache),
            sql_cache: Arc::clone(&self.sql_cache),
        }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        self.inner.table_exists(table).await
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.inner.table_names().await
    }

    fn layer_names(&self) -> Vec<&'static str> {
        let mut names = vec!["cached"];
        names.extend(self.inner.layer_names());
        names
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

struct CachedTransaction {
    inner: Box<dyn DataTransaction>,
    kv_cache: Arc<MemoryCache>,
    sql_cache: Arc<MemoryCache>,
}

#[async_trait]
impl DataTransaction for CachedTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.inner.execute(sql, params).await
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        self.inner.commit().await?;
        let _ = self.kv_cache.clear().await;
        let _ = self.sql_cache.clear().await;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        self.inner.rollback().await
    }
}

#[cfg(test)]
#[path = "cached_tests.rs"]
mod tests;
