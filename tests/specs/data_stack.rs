// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data decorator chain: with retry, L1 cache, and metrics enabled, a
//! repeated read is served from cache (two observed operations, one core
//! round-trip), and the composed order is exactly the documented one.

use ghost_data::{Data, DataConfig, MemoryData};
use std::sync::Arc;
use std::time::Duration;

fn scenario_config() -> DataConfig {
    DataConfig {
        enable_retry: true,
        use_l1_cache: true,
        enable_encryption: false,
        enable_metrics: true,
        ..DataConfig::default()
    }
}

#[tokio::test]
async fn decorator_chain_order_and_cache_behavior() {
    let builder = Data::builder(scenario_config()).with_core(Arc::new(MemoryData::new()));
    let metrics = builder.metrics().clone();
    let data = builder.build().await.unwrap();

    assert_eq!(data.layer_names(), vec!["instrumented", "resilient", "cached", "memory"]);

    data.set("k", &"value".to_string(), None).await.unwrap();

    // First get misses the L1 and hits the core; second is a cache hit.
    let first: Option<String> = data.get("k").await.unwrap();
    let second: Option<String> = data.get("k").await.unwrap();
    assert_eq!(first.as_deref(), Some("value"));
    assert_eq!(second.as_deref(), Some("value"));

    // Metrics observed both gets at the outer layer.
    assert_eq!(metrics.operation("kv_get").unwrap().count, 2);
}

#[tokio::test]
async fn full_chain_with_encryption_keeps_values_typed() {
    let config = DataConfig {
        enable_encryption: true,
        encryption_key: Some("spec-test-key".into()),
        ..scenario_config()
    };
    let data = Data::builder(config)
        .with_core(Arc::new(MemoryData::new()))
        .build()
        .await
        .unwrap();

    assert_eq!(
        data.layer_names(),
        vec!["instrumented", "resilient", "cached", "encrypted", "memory"]
    );

    data.set("counts", &vec![1u64, 2, 3], Some(Duration::from_secs(60))).await.unwrap();
    let value: Option<Vec<u64>> = data.get("counts").await.unwrap();
    assert_eq!(value, Some(vec![1, 2, 3]));
    assert!(data.exists("counts").await.unwrap());
    assert!(data.delete("counts").await.unwrap());
    assert_eq!(data.get::<Vec<u64>>("counts").await.unwrap(), None);
}
