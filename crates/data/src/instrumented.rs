// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outermost layer: operation counts, latency, error counts, and a
//! tracing span per operation. Passes everything through otherwise.

use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

#[derive(Default)]
struct OperationStats {
    count: AtomicU64,
    errors: AtomicU64,
    total_micros: AtomicU64,
}

/// Point-in-time view of one operation's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSnapshot {
    pub count: u64,
    pub errors: u64,
    pub total_micros: u64,
}

/// Shared metrics registry for the instrumented layer.
#[derive(Clone, Default)]
pub struct DataMetrics {
    ops: Arc<Mutex<HashMap<&'static str, Arc<OperationStats>>>>,
}

impl DataMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn stats(&self, op: &'static str) -> Arc<OperationStats> {
        Arc::clone(self.ops.lock().entry(op).or_default())
    }

    fn record(&self, op: &'static str, elapsed: Duration, failed: bool) {
        let stats = self.stats(op);
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats.total_micros.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if failed {
            stats.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> HashMap<&'static str, OperationSnapshot> {
        self.ops
            .lock()
            .iter()
            .map(|(op, stats)| {
                (
                    *op,
                    OperationSnapshot {
                        count: stats.count.load(Ordering::Relaxed),
                        errors: stats.errors.load(Ordering::Relaxed),
                        total_micros: stats.total_micros.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    pub fn operation(&self, op: &str) -> Option<OperationSnapshot> {
        self.snapshot().get(op).cloned()
    }
}

pub struct InstrumentedData {
    inner: Arc<dyn DataClient>,
    metrics: DataMetrics,
}

impl InstrumentedData {
    pub fn new(inner: Arc<dyn DataClient>, metrics: DataMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn metrics(&self) -> &DataMetrics {
        &self.metrics
    }

    async fn timed<T>(
        &self,
        op: &'static str,
        fut: impl std::future::Future<Output = Result<T, DataError>>,
    ) -> Result<T, DataError> {
        let start = Instant::now();
        let result = fut.instrument(tracing::debug_span!("data_op", op)).await;
        self.metrics.record(op, start.elapsed(), result.is_err());
        result
    }
}

#[async_trait]
impl DataClient for InstrumentedData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        self.timed("kv_get", self.inner.kv_get(key)).await
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.timed("kv_set", self.inner.kv_set(key, value, ttl)).await
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        self.timed("kv_delete", self.inner.kv_delete(key)).await
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        self.timed("kv_exists", self.inner.kv_exists(key)).await
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        self.timed("kv_get_many", self.inner.kv_get_many(keys)).await
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.timed("kv_set_many", self.inner.kv_set_many(pairs, ttl)).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.timed("query", self.inner.query(sql, params)).await
    }

    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.timed("query_single", self.inner.query_single(sql, params)).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.timed("execute", self.inner.execute(sql, params)).await
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        self.timed("execute_batch", self.inner.execute_batch(statements)).await
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        self.timed("begin", self.inner.begin()).await
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        self.timed("table_exists", self.inner.table_exists(table)).await
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.timed("table_names", self.inner.table_names()).await
    }

    fn layer_names(&self) -> Vec<&'static str> {
        let mut names = vec!["instrumented"];
        names.extend(self.inner.layer_names());
        names
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

#[cfg(test)]
#[path = "instrumented_tests.rs"]
mod tests;
