// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::probe::ProbeCore;

fn cached(probe: &ProbeCore) -> CachedData {
    CachedData::new(Arc::new(probe.clone()), Duration::from_secs(30))
}

#[tokio::test]
async fn second_get_is_served_from_cache() {
    let probe = ProbeCore::new();
    let data = cached(&probe);
    data.kv_set("k", vec![9], None).await.unwrap();

    assert_eq!(data.kv_get("k").await.unwrap(), Some(vec![9]));
    assert_eq!(data.kv_get("k").await.unwrap(), Some(vec![9]));
    assert_eq!(probe.call_count("kv_get"), 1);
}

#[tokio::test]
async fn misses_are_not_cached() {
    let probe = ProbeCore::new();
    let data = cached(&probe);

    assert_eq!(data.kv_get("absent").await.unwrap(), None);
    assert_eq!(data.kv_get("absent").await.unwrap(), None);
    assert_eq!(probe.call_count("kv_get"), 2);
}

#[tokio::test]
async fn set_invalidates_the_cached_value() {
    let probe = ProbeCore::new();
    let data = cached(&probe);
    data.kv_set("k", vec![1], None).await.unwrap();
    let _ = data.kv_get("k").await.unwrap();

    data.kv_set("k", vec![2], None).await.unwrap();
    assert_eq!(data.kv_get("k").await.unwrap(), Some(vec![2]));
    assert_eq!(probe.call_count("kv_get"), 2);
}

#[tokio::test]
async fn delete_invalidates_too() {
    let probe = ProbeCore::new();
    let data = cached(&probe);
    data.kv_set("k", vec![1], None).await.unwrap();
    let _ = data.kv_get("k").await.unwrap();

    assert!(data.kv_delete("k").await.unwrap());
    assert_eq!(data.kv_get("k").await.unwrap(), None);
}

#[tokio::test]
async fn exists_uses_the_cached_value_when_present() {
    let probe = ProbeCore::new();
    let data = cached(&probe);
    data.kv_set("k", vec![1], None).await.unwrap();
    let _ = data.kv_get("k").await.unwrap();

    assert!(data.kv_exists("k").await.unwrap());
    assert_eq!(probe.call_count("kv_exists"), 0);
}

#[tokio::test]
async fn identical_queries_hit_the_cache() {
    let probe = ProbeCore::new();
    probe.set_rows(vec![serde_json::json!({"id": 1})]);
    let data = cached(&probe);
    let params = vec![serde_json::json!(5)];

    let first = data.query("SELECT * FROM t WHERE id = $1", &params).await.unwrap();
    let second = data.query("SELECT * FROM t WHERE id = $1", &params).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(probe.call_count("query"), 1);

    // Different params miss
    let _ = data.query("SELECT * FROM t WHERE id = $1", &[serde_json::json!(6)]).await.unwrap();
    assert_eq!(probe.call_count("query"), 2);
}

#[tokio::test]
async fn mutating_execute_clears_the_sql_cache() {
    let probe = ProbeCore::new();
    probe.set_rows(vec![serde_json::json!({"id": 1})]);
    let data = cached(&probe);

    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();
    data.execute("UPDATE t SET x = 1", &[]).await.unwrap();
    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(probe.call_count("query"), 2);
}

#[tokio::test]
async fn non_mutating_execute_keeps_the_cache() {
    let probe = ProbeCore::new();
    let data = cached(&probe);

    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();
    data.execute("EXPLAIN SELECT 1", &[]).await.unwrap();
    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(probe.call_count("query"), 1);
}

#[tokio::test]
async fn committed_transactions_drop_both_caches() {
    let probe = ProbeCore::new();
    let data = cached(&probe);
    data.kv_set("k", vec![1], None).await.unwrap();
    let _ = data.kv_get("k").await.unwrap();
    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();

    let mut tx = data.begin().await.unwrap();
    tx.execute("UPDATE t SET x = 1", &[]).await.unwrap();
    tx.commit().await.unwrap();

    let _ = data.kv_get("k").await.unwrap();
    let _ = data.query("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(probe.call_count("kv_get"), 2);
    assert_eq!(probe.call_count("query"), 2);
}

#[tokio::test]
async fn query_single_caches_separately_from_query() {
    let probe = ProbeCore::new();
    probe.set_rows(vec![serde_json::json!({"id": 1})]);
    let data = cached(&probe);

    let _ = data.query_single("SELECT * FROM t", &[]).await.unwrap();
    let _ = data.query_single("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(probe.call_count("query_single"), 1);
}
