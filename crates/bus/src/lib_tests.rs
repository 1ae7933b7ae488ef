// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ghost_cache::MemoryCache;

#[test]
fn bus_errors_map_into_the_taxonomy() {
    let err: GhostError = BusError::Unavailable("refused".into()).into();
    assert_eq!(err.kind(), "storage_connection_failed");

    let err: GhostError = BusError::Closed.into();
    assert_eq!(err.kind(), "invalid_operation");

    let err: GhostError = BusError::Serialization("bad".into()).into();
    assert_eq!(err.kind(), "serialization_error");
}

#[tokio::test]
async fn facade_is_cloneable_and_shares_the_transport() {
    let bus = Bus::local(Arc::new(MemoryCache::new()));
    let clone = bus.clone();

    let mut sub = bus.subscribe::<u32>("c").await.unwrap();
    clone.publish("c", &5u32).await.unwrap();
    assert_eq!(sub.recv().await, Some(5));
}

#[tokio::test]
async fn priority_publish_degrades_to_publish() {
    let bus = Bus::local(Arc::new(MemoryCache::new()));
    let mut sub = bus.subscribe::<u32>("c").await.unwrap();

    bus.publish_with_priority("c", &1u32, Priority::Critical).await.unwrap();
    bus.publish_with_priority("c", &2u32, Priority::Low).await.unwrap();

    // Same delivery path, publish order preserved
    assert_eq!(sub.recv().await, Some(1));
    assert_eq!(sub.recv().await, Some(2));
}
