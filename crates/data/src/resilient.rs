// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry and circuit-breaking layer.
//!
//! Retries transient failures (connection loss, timeouts) with
//! exponential backoff. Reads and idempotent key/value writes are
//! retried; SQL writes are not unless explicitly marked in config. A
//! circuit breaker per operation category (kv vs sql) fails fast while a
//! backend is down.

use crate::config::{BreakerConfig, RetryConfig};
use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Failure-threshold circuit breaker with timed half-open recovery.
pub struct CircuitBreaker {
    name: &'static str,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Gate a call. Open circuits let one probe through after the open
    /// timeout (transitioning to HalfOpen).
    pub fn should_allow(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed =
                    inner.opened_at.map(|at| at.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.config.open_timeout() {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    debug!(breaker = self.name, "circuit half-open");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    debug!(breaker = self.name, "circuit closed");
                }
            }
            _ => {
                inner.consecutive_failures = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!(breaker = self.name, "circuit re-opened from half-open");
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        breaker = self.name,
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }
}

/// Operation category, one breaker each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Kv,
    Sql,
}

pub struct ResilientData {
    inner: Arc<dyn DataClient>,
    retry: RetryConfig,
    kv_breaker: CircuitBreaker,
    sql_breaker: CircuitBreaker,
}

impl ResilientData {
    pub fn new(inner: Arc<dyn DataClient>, retry: RetryConfig, breaker: BreakerConfig) -> Self {
        Self {
            inner,
            retry,
            kv_breaker: CircuitBreaker::new("kv", breaker.clone()),
            sql_breaker: CircuitBreaker::new("sql", breaker),
        }
    }

    pub fn kv_circuit_state(&self) -> CircuitState {
        self.kv_breaker.state()
    }

    pub fn sql_circuit_state(&self) -> CircuitState {
        self.sql_breaker.state()
    }

    fn breaker(&self, category: Category) -> &CircuitBreaker {
        match category {
            Category::Kv => &self.kv_breaker,
            Category::Sql => &self.sql_breaker,
        }
    }

    /// Run an operation behind the category breaker, retrying transient
    /// failures when `retryable`.
    async fn call<T, F, Fut>(
        &self,
        category: Category,
        retryable: bool,
        mut op: F,
    ) -> Result<T, DataError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DataError>>,
    {
        let breaker = self.breaker(category);
        if !breaker.should_allow() {
            return Err(DataError::CircuitOpen(breaker.name()));
        }

        let max_attempts = if retryable { self.retry.max_attempts.max(1) } else { 1 };
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(e) => {
                    breaker.record_failure();
                    if attempt >= max_attempts || !e.is_transient() {
                        return Err(e);
                    }
                    let delay = Duration::from_millis(
                        self.retry.base_delay_ms * 2u64.pow(attempt - 1),
                    );
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    if !breaker.should_allow() {
                        return Err(DataError::CircuitOpen(breaker.name()));
                    }
                }
            }
        }
    }
}

#[async_trait]
impl DataClient for ResilientData {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        self.call(Category::Kv, true, || self.inner.kv_get(key)).await
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        // Upserts are idempotent, safe to retry
        self.call(Category::Kv, true, || self.inner.kv_set(key, value.clone(), ttl)).await
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        self.call(Category::Kv, true, || self.inner.kv_delete(key)).await
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        self.call(Category::Kv, true, || self.inner.kv_exists(key)).await
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        self.call(Category::Kv, true, || self.inner.kv_get_many(keys)).await
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.call(Category::Kv, true, || self.inner.kv_set_many(pairs.clone(), ttl)).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.call(Category::Sql, true, || self.inner.query(sql, params)).await
    }

    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.call(Category::Sql, true, || self.inner.query_single(sql, params)).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        let retryable = self.retry.retry_sql_writes;
        self.call(Category::Sql, retryable, || self.inner.execute(sql, params)).await
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        let retryable = self.retry.retry_sql_writes;
        self.call(Category::Sql, retryable, || self.inner.execute_batch(statements)).await
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        let tx = self.call(Category::Sql, true, || self.inner.begin()).await?;
        Ok(Box::new(ResilientTransaction { inner: Some(tx) }))
    }

    async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        self.call(Category::Sql, true, || self.inner.table_exists(table)).await
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.call(Category::Sql, true, || self.inner.table_names()).await
    }

    fn layer_names(&self) -> Vec<&'static str> {
        let mut names = vec!["resilient"];
        names.extend(self.inner.layer_names());
        names
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

/// Transaction routed through the resilient layer. Statements inside a
/// transaction are never retried (they are not idempotent against the
/// transaction's own state); terminal-state enforcement happens here so a
/// finished handle can't touch the inner transaction again.
pub struct ResilientTransaction {
    inner: Option<Box<dyn DataTransaction>>,
}

#[async_trait]
impl DataTransaction for ResilientTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        match self.inner.as_mut() {
            Some(tx) => tx.execute(sql, params).await,
            None => Err(DataError::InvalidOperation("transaction already finished".into())),
        }
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        match self.inner.take() {
            Some(mut tx) => tx.commit().await,
            None => Err(DataError::InvalidOperation("transaction already finished".into())),
        }
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        match self.inner.take() {
            Some(mut tx) => tx.rollback().await,
            None => Err(DataError::InvalidOperation("transaction already finished".into())),
        }
    }
}

#[cfg(test)]
#[path = "resilient_tests.rs"]
mod tests;
