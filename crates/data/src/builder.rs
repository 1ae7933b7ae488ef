// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack composition.
//!
//! The builder is the only place layers are assembled, which is what
//! keeps the order fixed: Instrumented → Resilient → Cached → Encrypted →
//! Core. Omitted layers collapse.

use crate::cached::CachedData;
use crate::config::DataConfig;
use crate::encrypted::EncryptedData;
use crate::instrumented::{DataMetrics, InstrumentedData};
use crate::memory::MemoryData;
use crate::postgres::PostgresData;
use crate::resilient::ResilientData;
use crate::{Data, DataClient, DataError};
use std::sync::Arc;
use tracing::info;

pub struct DataBuilder {
    config: DataConfig,
    core: Option<Arc<dyn DataClient>>,
    metrics: DataMetrics,
}

impl DataBuilder {
    pub fn new(config: DataConfig) -> Self {
        Self { config, core: None, metrics: DataMetrics::new() }
    }

    /// Supply the core client directly (tests, custom engines). Overrides
    /// the configured backend.
    pub fn with_core(mut self, core: Arc<dyn DataClient>) -> Self {
        self.core = Some(core);
        self
    }

    /// Use a shared metrics registry instead of a fresh one.
    pub fn with_metrics(mut self, metrics: DataMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &DataMetrics {
        &self.metrics
    }

    pub async fn build(self) -> Result<Data, DataError> {
        let core: Arc<dyn DataClient> = match self.core {
            Some(core) => core,
            None => match &self.config.postgres_connection {
                Some(url) => Arc::new(PostgresData::connect(url).await?),
                None => Arc::new(MemoryData::new()),
            },
        };

        let mut client: Arc<dyn DataClient> = core;

        if self.config.enable_encryption {
            let key = self
                .config
                .encryption_key
                .as_deref()
                .ok_or_else(|| {
                    DataError::Validation("encryption enabled without a key".into())
                })?;
            client = Arc::new(EncryptedData::new(client, key)?);
        }
        if self.config.use_l1_cache {
            client = Arc::new(CachedData::new(client, self.config.cache_ttl()));
        }
        if self.config.enable_retry {
            client = Arc::new(ResilientData::new(
                client,
                self.config.retry.clone(),
                self.config.breaker.clone(),
            ));
        }
        if self.config.enable_metrics {
            client = Arc::new(InstrumentedData::new(client, self.metrics));
        }

        info!(layers = ?client.layer_names(), backend = client.backend_name(), "data stack composed");
        Ok(Data::new(client))
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
