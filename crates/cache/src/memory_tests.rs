// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::CacheExt;
use ghost_core::FakeClock;
use std::time::Duration;

#[tokio::test]
async fn set_then_get_round_trips() {
    let cache = MemoryCache::new();
    cache.set("k", &"value".to_string(), None).await.unwrap();
    assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("value"));
}

#[tokio::test]
async fn get_after_delete_is_absent() {
    let cache = MemoryCache::new();
    cache.set("k", &1u64, None).await.unwrap();
    assert!(cache.delete("k").await.unwrap());
    assert_eq!(cache.get::<u64>("k").await.unwrap(), None);
    assert!(!cache.delete("k").await.unwrap());
}

#[tokio::test]
async fn entries_expire_with_the_clock() {
    let clock = FakeClock::new();
    let cache = MemoryCache::with_clock(clock.clone());
    cache.set("k", &1u64, Some(Duration::from_secs(60))).await.unwrap();

    assert!(cache.exists("k").await.unwrap());
    clock.advance(Duration::from_secs(61));
    assert!(!cache.exists("k").await.unwrap());
    assert_eq!(cache.get::<u64>("k").await.unwrap(), None);
}

#[tokio::test]
async fn set_overwrites_value_and_ttl() {
    let clock = FakeClock::new();
    let cache = MemoryCache::with_clock(clock.clone());
    cache.set("k", &1u64, Some(Duration::from_secs(1))).await.unwrap();
    cache.set("k", &2u64, None).await.unwrap();

    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.get::<u64>("k").await.unwrap(), Some(2));
}

#[tokio::test]
async fn expire_restamps_only_live_keys() {
    let clock = FakeClock::new();
    let cache = MemoryCache::with_clock(clock.clone());
    cache.set("k", &1u64, Some(Duration::from_secs(5))).await.unwrap();

    assert!(cache.expire("k", Duration::from_secs(120)).await.unwrap());
    clock.advance(Duration::from_secs(60));
    assert_eq!(cache.get::<u64>("k").await.unwrap(), Some(1));

    assert!(!cache.expire("missing", Duration::from_secs(1)).await.unwrap());
}

#[tokio::test]
async fn purge_drops_expired_entries() {
    let clock = FakeClock::new();
    let cache = MemoryCache::with_clock(clock.clone());
    cache.set("a", &1u64, Some(Duration::from_secs(1))).await.unwrap();
    cache.set("b", &2u64, None).await.unwrap();

    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn clear_removes_everything() {
    let cache = MemoryCache::new();
    cache.set("a", &1u64, None).await.unwrap();
    cache.set("b", &2u64, None).await.unwrap();
    cache.clear().await.unwrap();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn memory_backend_is_always_available() {
    assert!(MemoryCache::new().is_available().await);
}
