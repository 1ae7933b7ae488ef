// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote broker bus over Redis.
//!
//! Pattern subscriptions are server-side (`PSUBSCRIBE`), so no local
//! fan-out table is needed; each subscription gets a dedicated pubsub
//! connection and a pump task forwarding broker messages into the
//! subscription queue. At-rest copies, subscriber counts, and the
//! active-channel set live in broker keys with the same shapes the local
//! bus persists.

use crate::subscription::{BusMessage, Subscription};
use crate::{BusError, MessageBus, DEFAULT_MESSAGE_TTL};
use async_trait::async_trait;
use futures_util::StreamExt;
use ghost_core::channel::channels;
use ghost_core::Priority;
use parking_lot::Mutex;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Broker-side index of the persisted message keys for one channel.
fn message_index_key(channel: &str) -> String {
    format!("messages:{}", channel)
}

pub struct RedisBus {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
    /// pattern → cancellation tokens of live pump tasks
    pumps: Mutex<HashMap<String, Vec<CancellationToken>>>,
    cancel: CancellationToken,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(url).map_err(map_redis)?;
        let conn = redis::aio::ConnectionManager::new(client.clone()).await.map_err(map_redis)?;
        Ok(Self {
            client,
            conn,
            pumps: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.cancel.is_cancelled() {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }
}

fn map_redis(e: redis::RedisError) -> BusError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        BusError::Unavailable(e.to_string())
    } else {
        BusError::Operation(e.to_string())
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish_bytes(
        &self,
        channel: &str,
        payload: Vec<u8>,
        ttl: Option<Duration>,
        _priority: Priority,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut conn = self.conn.clone();

        // At-rest copy with TTL, indexed for clear_channel.
        let ttl_secs = ttl.unwrap_or(DEFAULT_MESSAGE_TTL).as_secs().max(1);
        let key = channels::message_key(channel, &uuid::Uuid::new_v4().to_string());
        let _: () = conn.set_ex(&key, payload.as_slice(), ttl_secs).await.map_err(map_redis)?;
        let _: () = conn.sadd(message_index_key(channel), &key).await.map_err(map_redis)?;
        let _: () =
            conn.sadd(channels::ACTIVE_CHANNELS_KEY, channel).await.map_err(map_redis)?;

        let receivers: i64 = conn.publish(channel, payload).await.map_err(map_redis)?;
        debug!(channel, receivers, "published to broker");
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BusError> {
        self.ensure_open()?;

        let mut pubsub = self.client.get_async_pubsub().await.map_err(map_redis)?;
        let is_pattern = pattern.ends_with(":*");
        if is_pattern {
            pubsub.psubscribe(pattern).await.map_err(map_redis)?;
        } else {
            pubsub.subscribe(pattern).await.map_err(map_redis)?;
            let mut conn = self.conn.clone();
            let _: i64 = conn
                .incr(channels::subscribers_key(pattern), 1)
                .await
                .map_err(map_redis)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.child_token();
        self.pumps.lock().entry(pattern.to_string()).or_default().push(cancel.clone());

        let owned_pattern = pattern.to_string();
        tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = stream.next() => {
                        let Some(msg) = msg else { break };
                        let topic = msg.get_channel_name().to_string();
                        let payload: Vec<u8> = match msg.get_payload() {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(topic, error = %e, "dropping unreadable broker message");
                                continue;
                            }
                        };
                        if tx.send(BusMessage { topic, payload }).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(pattern = %owned_pattern, "subscription pump ended");
        });

        Ok(Subscription::new(pattern.to_string(), rx))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let cancelled = {
            let mut pumps = self.pumps.lock();
            pumps.remove(channel).unwrap_or_default()
        };
        let count = cancelled.len() as i64;
        for token in cancelled {
            token.cancel();
        }
        if count > 0 && !channel.ends_with(":*") {
            let mut conn = self.conn.clone();
            let _: i64 = conn
                .decr(channels::subscribers_key(channel), count)
                .await
                .map_err(map_redis)?;
        }
        Ok(())
    }

    async fn subscriber_count(&self, channel: &str) -> Result<u64, BusError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> =
            conn.get(channels::subscribers_key(channel)).await.map_err(map_redis)?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn active_channels(&self) -> Result<Vec<String>, BusError> {
        let mut conn = self.conn.clone();
        let mut names: Vec<String> =
            conn.smembers(channels::ACTIVE_CHANNELS_KEY).await.map_err(map_redis)?;
        names.sort();
        Ok(names)
    }

    async fn clear_channel(&self, channel: &str) -> Result<(), BusError> {
        self.unsubscribe(channel).await?;

        let mut conn = self.conn.clone();
        let keys: Vec<String> =
            conn.smembers(message_index_key(channel)).await.map_err(map_redis)?;
        for key in keys {
            let _: i64 = conn.del(&key).await.map_err(map_redis)?;
        }
        let _: i64 = conn.del(message_index_key(channel)).await.map_err(map_redis)?;
        let _: i64 =
            conn.srem(channels::ACTIVE_CHANNELS_KEY, channel).await.map_err(map_redis)?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let mut conn = self.conn.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        pong.is_ok()
    }

    async fn close(&self) {
        self.cancel.cancel();
        let mut pumps = self.pumps.lock();
        for (_, tokens) in pumps.drain() {
            for token in tokens {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
