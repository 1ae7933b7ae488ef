// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test-only core that records every call it sees.

use crate::{BatchStatement, DataClient, DataError, DataTransaction};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct ProbeState {
    pub calls: Vec<String>,
    pub kv: HashMap<String, Vec<u8>>,
    pub rows: Vec<Value>,
}

/// In-memory core recording the operations that reach it.
#[derive(Clone, Default)]
pub struct ProbeCore {
    pub state: Arc<Mutex<ProbeState>>,
    pub fail_transient: Arc<AtomicBool>,
}

impl ProbeCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| c.as_str() == op).count()
    }

    pub fn set_rows(&self, rows: Vec<Value>) {
        self.state.lock().rows = rows;
    }

    /// Make every operation fail with a transient error.
    pub fn fail_transiently(&self, on: bool) {
        self.fail_transient.store(on, Ordering::SeqCst);
    }

    fn record(&self, op: &str) -> Result<(), DataError> {
        self.state.lock().calls.push(op.to_string());
        if self.fail_transient.load(Ordering::SeqCst) {
            Err(DataError::ConnectionFailed("probe offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataClient for ProbeCore {
    async fn kv_get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        self.record("kv_get")?;
        Ok(self.state.lock().kv.get(key).cloned())
    }

    async fn kv_set(
        &self,
        key: &str,
        value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.record("kv_set")?;
        self.state.lock().kv.insert(key.to_string(), value);
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<bool, DataError> {
        self.record("kv_delete")?;
        Ok(self.state.lock().kv.remove(key).is_some())
    }

    async fn kv_exists(&self, key: &str) -> Result<bool, DataError> {
        self.record("kv_exists")?;
        Ok(self.state.lock().kv.contains_key(key))
    }

    async fn kv_get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, DataError> {
        self.record("kv_get_many")?;
        let state = self.state.lock();
        Ok(keys.iter().map(|k| state.kv.get(k).cloned()).collect())
    }

    async fn kv_set_many(
        &self,
        pairs: Vec<(String, Vec<u8>)>,
        _ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        self.record("kv_set_many")?;
        let mut state = self.state.lock();
        for (k, v) in pairs {
            state.kv.insert(k, v);
        }
        Ok(())
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Value>, DataError> {
        self.record("query")?;
        Ok(self.state.lock().rows.clone())
    }

    async fn query_single(
        &self,
        _sql: &str,
        _params: &[Value],
    ) -> Result<Option<Value>, DataError> {
        self.record("query_single")?;
        Ok(self.state.lock().rows.first().cloned())
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64, DataError> {
        self.record("execute")?;
        Ok(1)
    }

    async fn execute_batch(&self, statements: &[BatchStatement]) -> Result<u64, DataError> {
        self.record("execute_batch")?;
        Ok(statements.len() as u64)
    }

    async fn begin(&self) -> Result<Box<dyn DataTransaction>, DataError> {
        self.record("begin")?;
        Ok(Box::new(ProbeTransaction { core: self.clone(), live: true }))
    }

    async fn table_exists(&self, _table: &str) -> Result<bool, DataError> {
        self.record("table_exists")?;
        Ok(false)
    }

    async fn table_names(&self) -> Result<Vec<String>, DataError> {
        self.record("table_names")?;
        Ok(vec![])
    }

    fn layer_names(&self) -> Vec<&'static str> {
        vec!["probe"]
    }

    fn backend_name(&self) -> &'static str {
        "probe"
    }
}

pub struct ProbeTransaction {
    core: ProbeCore,
    live: bool,
}

#[async_trait]
impl DataTransaction for ProbeTransaction {
    async fn execute(&mut self, _sql: &str, _params: &[Value]) -> Result<u64, DataError> {
        if !self.live {
            return Err(DataError::InvalidOperation("transaction is finished".into()));
        }
        self.core.record("tx_execute")?;
        Ok(1)
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        if !self.live {
            return Err(DataError::InvalidOperation("transaction already finished".into()));
        }
        self.live = false;
        self.core.record("tx_commit")
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        if !self.live {
            return Err(DataError::InvalidOperation("transaction already finished".into()));
        }
        self.live = false;
        self.core.record("tx_rollback")
    }
}
