// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost-data: the composable data-access stack.
//!
//! A [`DataClient`] offers key/value, SQL, transaction, and schema
//! operations. Decorators wrap a core client in a fixed order, outermost
//! to innermost:
//!
//! Instrumented → Resilient → Cached → Encrypted → Core
//!
//! Each layer is opt-in via [`DataConfig`]; omitted layers collapse. The
//! composed order is observable through [`DataClient::layer_names`], no
//! reflection involved.

pub mod builder;
pub mod cached;
pub mod config;
pub mod encrypted;
pub mod instrumented;
pub mod memory;
pub mod postgres;
pub mod resilient;
pub mod sql;

pub use builder::DataBuilder;
pub use cached::CachedData;
pub use config::{BreakerConfig, DataConfig, RetryConfig};
pub use encrypted::EncryptedData;
pub use instrumented::{DataMetrics, InstrumentedData, OperationSnapshot};
pub use memory::MemoryData;
pub use postgres::PostgresData;
pub use resilient::{CircuitBreaker, CircuitState, ResilientData};

use async_trait::async_trait;
use ghost_core::GhostError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Data-layer errors.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("circuit open for {0} operations")]
    CircuitOpen(&'static str),
}

impl DataError {
    /// Retry-worthy failures: connection loss and timeouts only.
    pub fn is_transient(&self) -> bool {
        matches!(self, DataError::ConnectionFailed(_) | DataError::Timeout(_))
    }
}

impl From<DataError> for GhostError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::ConnectionFailed(msg) => GhostError::StorageConnectionFailed(msg),
            DataError::OperationFailed(msg) => GhostError::StorageOperationFailed(msg),
            DataError::Validation(msg) => GhostError::Validation(msg),
            DataError::InvalidOperation(msg) => GhostError::InvalidOperation(msg),
            DataError::NotImplemented(msg) => GhostError::NotImplemented(msg),
            DataError::Timeout(msg) => GhostError::Timeout(msg),
            DataError::CircuitOpen(_) => GhostError::StorageConnectionFailed(err.to_string()),
        }
    }
}

/// One statement of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BatchStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }
}

/// A live transaction handle. Commit and rollback are terminal; a second
/// call fails with `InvalidOperation`. Handles are single-threaded by
/// contract: concurrent use of one handle is undefined.
#[async_trait]
pub trait DataTransaction: Send {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DataError>;
    async fn commit(&mut self) -> Result<(), DataError>;
    async fn rollback(&mut self) -> Result<(), DataError>;
}

/// The data-access contract all layers implement.
#[async_trait]
pub trait DataClient: Send + Sync {
    // -- key/value --
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError>;
    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError>;
    async fn kv_delete(&self, key: &str) -> Result<bool, DataError>;
    async fn kv_exists(&self, key: &str) -> Result<bool, DataError>;
    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError>;
    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        ttl: Option<Duration>,
    ) -> Result<(), DataError>;

    // -- SQL --
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError>;
    async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError>;
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError>;
    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError>;

    // -- transactions --
    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError>;

    // -- schema --
    async fn table_exists(&self, table: &str) -> Result<bool, DataError>;
    async fn table_names(&self) -> Result<Vec<String>, DataError>;

    // -- introspection --
    /// Layer identifiers, outermost first, ending at the core.
    fn layer_names(&self) -> Vec<&'static str>;
    /// Name of the backing engine.
    fn backend_name(&self) -> &'static str;
}

/// Typed facade applications hold.
#[derive(Clone)]
pub struct Data {
    inner: Arc<dyn DataClient>,
}

impl Data {
    pub fn new(inner: Arc<dyn DataClient>) -> Self {
        Self { inner }
    }

    pub fn builder(config: DataConfig) -> DataBuilder {
        DataBuilder::new(config)
    }

    /// The underlying (outermost) client.
    pub fn client(&self) -> &Arc<dyn DataClient> {
        &self.inner
    }

    pub fn layer_names(&self) -> Vec<&'static str> {
        self.inner.layer_names()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DataError> {
        match self.inner.kv_get(key).await? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| DataError::Validation(e.to_string())),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| DataError::Validation(e.to_string()))?;
        self.inner.kv_set(key, bytes, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, DataError> {
        self.inner.kv_delete(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool, DataError> {
        self.inner.kv_exists(key).await
    }

    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.inner.query(sql, params).await
    }

    pub async fn query_single(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.inner.query_single(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, DataError> {
        self.inner.execute(sql, params).await
    }

    pub async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        self.inner.execute_batch(statements).await
    }

    pub async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        self.inner.begin().await
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, DataError> {
        self.inner.table_exists(table).await
    }

    pub async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.inner.table_names().await
    }
}

#[cfg(test)]
pub(crate) mod probe;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
