// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection delivery counters.
//!
//! Monotonic atomics mutated only by the owning connection; anyone may take
//! a [`StatisticsSnapshot`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one connection.
#[derive(Debug, Default)]
pub struct ConnectionStatistics {
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    messages_dropped: AtomicU64,
    messages_requeued: AtomicU64,
    send_errors: AtomicU64,
    reconnect_attempts: AtomicU64,
    last_send_ms: AtomicU64,
    last_receive_ms: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ConnectionStatistics {
    pub fn record_sent(&self, now_ms: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.last_send_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_received(&self, now_ms: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_receive_ms.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.messages_requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, error: impl Into<String>) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
        *self.last_error.lock() = Some(error.into());
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn total_messages_requeued(&self) -> u64 {
        self.messages_requeued.load(Ordering::Relaxed)
    }

    pub fn total_reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            messages_requeued: self.messages_requeued.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            last_send_ms: self.last_send_ms.load(Ordering::Relaxed),
            last_receive_ms: self.last_receive_ms.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// Point-in-time copy of [`ConnectionStatistics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub messages_requeued: u64,
    pub send_errors: u64,
    pub reconnect_attempts: u64,
    pub last_send_ms: u64,
    pub last_receive_ms: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
