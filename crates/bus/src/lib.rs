// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost-bus: topic pub/sub with wildcard subscriptions.
//!
//! Two implementations behind one object-safe trait: [`LocalBus`]
//! (cache-persisted, in-process fan-out) and [`RedisBus`] (remote broker
//! with server-side pattern subscription). The typed [`Bus`] facade is
//! what applications hold.
//!
//! Delivery is at-least-once: every publish is also persisted in the cache
//! under `message:{channel}:{uuid}` with a TTL (default one hour).
//! Ordering is FIFO per (publisher, channel); there is no global order.

mod local;
mod remote;
mod subscription;

pub use local::LocalBus;
pub use remote::RedisBus;
pub use subscription::{BusMessage, Subscription, TypedSubscription};

use async_trait::async_trait;
use ghost_cache::CacheError;
use ghost_core::{GhostError, Priority};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long an at-rest copy of a published message survives by default.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(60 * 60);

/// Bus transport errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("bus operation failed: {0}")]
    Operation(String),

    #[error("bus is closed")]
    Closed,

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<BusError> for GhostError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Unavailable(msg) => GhostError::StorageConnectionFailed(msg),
            BusError::Closed => GhostError::InvalidOperation("bus is closed".to_string()),
            BusError::Serialization(msg) => GhostError::Serialization(msg),
            BusError::Cache(e) => e.into(),
            BusError::Operation(msg) => GhostError::StorageOperationFailed(msg),
        }
    }
}

/// Object-safe transport: bytes at the seam, typing on [`Bus`].
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Deliver to every currently matching subscriber and persist an
    /// at-rest copy with the given TTL.
    async fn publish_bytes(
        &self,
        channel: &str,
        payload: Vec<u8>,
        ttl: Option<Duration>,
        priority: Priority,
    ) -> Result<(), BusError>;

    /// Subscribe to a literal channel or a `prefix:*` pattern.
    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BusError>;

    /// Detach local listeners subscribed to exactly this channel.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError>;

    /// Local subscriber count, plus the remote count when known.
    async fn subscriber_count(&self, channel: &str) -> Result<u64, BusError>;

    async fn active_channels(&self) -> Result<Vec<String>, BusError>;

    /// Delete persisted messages for the channel and drop its local subs.
    async fn clear_channel(&self, channel: &str) -> Result<(), BusError>;

    /// Broker liveness probe.
    async fn is_available(&self) -> bool;

    /// Terminate all subscriptions. Idempotent.
    async fn close(&self);
}

/// Cloneable typed facade over a [`MessageBus`].
#[derive(Clone)]
pub struct Bus {
    inner: Arc<dyn MessageBus>,
}

impl Bus {
    pub fn new(inner: Arc<dyn MessageBus>) -> Self {
        Self { inner }
    }

    /// In-process bus persisted through the given cache.
    pub fn local(cache: Arc<dyn ghost_cache::Cache>) -> Self {
        Self::new(Arc::new(LocalBus::new(cache)))
    }

    /// Remote broker bus.
    pub async fn redis(url: &str) -> Result<Self, BusError> {
        Ok(Self::new(Arc::new(RedisBus::connect(url).await?)))
    }

    /// Publish a JSON-encoded message at Normal priority.
    pub async fn publish<T: Serialize + Sync>(
        &self,
        channel: &str,
        message: &T,
    ) -> Result<(), BusError> {
        self.publish_with_priority(channel, message, Priority::Normal).await
    }

    /// Publish a JSON-encoded message. Implementations without broker-side
    /// priority degrade to plain publish; the priority still matters to
    /// queueing layers above.
    pub async fn publish_with_priority<T: Serialize + Sync>(
        &self,
        channel: &str,
        message: &T,
        priority: Priority,
    ) -> Result<(), BusError> {
        let payload =
            ghost_core::to_json(message).map_err(|e| BusError::Serialization(e.to_string()))?;
        self.inner.publish_bytes(channel, payload, Some(DEFAULT_MESSAGE_TTL), priority).await
    }

    /// Publish a compact-binary message (heartbeats, metrics).
    pub async fn publish_binary<T: Serialize + Sync>(
        &self,
        channel: &str,
        message: &T,
        priority: Priority,
    ) -> Result<(), BusError> {
        let payload =
            ghost_core::to_payload(message).map_err(|e| BusError::Serialization(e.to_string()))?;
        self.inner.publish_bytes(channel, payload, Some(DEFAULT_MESSAGE_TTL), priority).await
    }

    /// Publish pre-encoded bytes (the connection queue path).
    pub async fn publish_bytes(
        &self,
        channel: &str,
        payload: Vec<u8>,
        priority: Priority,
    ) -> Result<(), BusError> {
        self.inner.publish_bytes(channel, payload, Some(DEFAULT_MESSAGE_TTL), priority).await
    }

    /// Subscribe expecting JSON payloads.
    pub async fn subscribe<T: DeserializeOwned>(
        &self,
        pattern: &str,
    ) -> Result<TypedSubscription<T>, BusError> {
        Ok(TypedSubscription::json(self.inner.subscribe_pattern(pattern).await?))
    }

    /// Subscribe expecting compact-binary payloads.
    pub async fn subscribe_binary<T: DeserializeOwned>(
        &self,
        pattern: &str,
    ) -> Result<TypedSubscription<T>, BusError> {
        Ok(TypedSubscription::binary(self.inner.subscribe_pattern(pattern).await?))
    }

    /// Subscribe at the byte level.
    pub async fn subscribe_raw(&self, pattern: &str) -> Result<Subscription, BusError> {
        self.inner.subscribe_pattern(pattern).await
    }

    pub async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        self.inner.unsubscribe(channel).await
    }

    pub async fn subscriber_count(&self, channel: &str) -> Result<u64, BusError> {
        self.inner.subscriber_count(channel).await
    }

    pub async fn active_channels(&self) -> Result<Vec<String>, BusError> {
        self.inner.active_channels().await
    }

    pub async fn clear_channel(&self, channel: &str) -> Result<(), BusError> {
        self.inner.clear_channel(channel).await
    }

    pub async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    pub async fn close(&self) {
        self.inner.close().await
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
