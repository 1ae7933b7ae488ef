// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bus over a cache.
//!
//! Fan-out happens locally: the subscription table maps pattern →
//! senders, and a publish walks every matching pattern synchronously, so
//! messages from one publisher arrive in publish order. The cache holds
//! the at-rest copies, the subscriber counts, and the active-channel set
//! (same persisted shape the remote broker uses).

use crate::subscription::{BusMessage, Subscription};
use crate::{BusError, MessageBus};
use async_trait::async_trait;
use ghost_cache::{Cache, CacheExt};
use ghost_core::channel::channels;
use ghost_core::{channel_matches, Priority};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

struct SubEntry {
    tx: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Default)]
struct SubTable {
    /// pattern → live subscriber senders
    subs: HashMap<String, Vec<SubEntry>>,
    /// channels that have seen a publish
    active: BTreeSet<String>,
    /// channel → persisted cache keys (for clear_channel)
    persisted: HashMap<String, Vec<String>>,
}

pub struct LocalBus {
    cache: Arc<dyn Cache>,
    table: Mutex<SubTable>,
    closed: AtomicBool,
}

impl LocalBus {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache, table: Mutex::new(SubTable::default()), closed: AtomicBool::new(false) }
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BusError::Closed)
        } else {
            Ok(())
        }
    }

    /// Mirror the subscriber count and active-channel set into the cache.
    async fn persist_bookkeeping(&self, channel: &str) {
        let (count, active) = {
            let table = self.table.lock();
            let count = table
                .subs
                .iter()
                .filter(|(pattern, entries)| {
                    channel_matches(pattern, channel) && !entries.is_empty()
                })
                .map(|(_, entries)| entries.len() as u64)
                .sum::<u64>();
            let active: Vec<String> = table.active.iter().cloned().collect();
            (count, active)
        };
        let _ = self.cache.set(&channels::subscribers_key(channel), &count, None).await;
        let _ = self.cache.set(channels::ACTIVE_CHANNELS_KEY, &active, None).await;
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn publish_bytes(
        &self,
        channel: &str,
        payload: Vec<u8>,
        ttl: Option<Duration>,
        _priority: Priority,
    ) -> Result<(), BusError> {
        self.ensure_open()?;

        // At-rest copy first: delivery is at-least-once even if the
        // process dies between persist and fan-out.
        let key = channels::message_key(channel, &uuid::Uuid::new_v4().to_string());
        self.cache.set(&key, &payload, ttl).await?;

        {
            let mut table = self.table.lock();
            table.active.insert(channel.to_string());
            table.persisted.entry(channel.to_string()).or_default().push(key);

            let msg = BusMessage { topic: channel.to_string(), payload };
            for (pattern, entries) in table.subs.iter_mut() {
                if !channel_matches(pattern, channel) {
                    continue;
                }
                entries.retain(|entry| entry.tx.send(msg.clone()).is_ok());
            }
        }

        self.persist_bookkeeping(channel).await;
        Ok(())
    }

    async fn subscribe_pattern(&self, pattern: &str) -> Result<Subscription, BusError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.table
            .lock()
            .subs
            .entry(pattern.to_string())
            .or_default()
            .push(SubEntry { tx });
        debug!(pattern, "subscribed");
        Ok(Subscription::new(pattern.to_string(), rx))
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        // Dropping the senders ends the receivers' streams.
        self.table.lock().subs.remove(channel);
        self.persist_bookkeeping(channel).await;
        Ok(())
    }

    async fn subscriber_count(&self, channel: &str) -> Result<u64, BusError> {
        let table = self.table.lock();
        Ok(table
            .subs
            .iter()
            .filter(|(pattern, _)| channel_matches(pattern, channel))
            .map(|(_, entries)| entries.len() as u64)
            .sum())
    }

    async fn active_channels(&self) -> Result<Vec<String>, BusError> {
        Ok(self.table.lock().active.iter().cloned().collect())
    }

    async fn clear_channel(&self, channel: &str) -> Result<(), BusError> {
        let keys = {
            let mut table = self.table.lock();
            table.subs.remove(channel);
            table.active.remove(channel);
            table.persisted.remove(channel).unwrap_or_default()
        };
        for key in keys {
            let _ = self.cache.delete(&key).await;
        }
        self.persist_bookkeeping(channel).await;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.cache.is_available().await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let mut table = self.table.lock();
        table.subs.clear();
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
