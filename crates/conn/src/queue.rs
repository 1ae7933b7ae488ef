// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded outgoing message queue.
//!
//! Capacity 1000, drop-oldest when full, except that Critical envelopes
//! are never the drop victim while anything else is queued. Pushing never
//! blocks the caller; a single reader drains the queue. Requeues go back
//! to the front so priority never reorders messages that are already
//! queued.

use ghost_core::{ConnectionStatistics, MessageEnvelope, Priority};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct OutgoingQueue {
    inner: Mutex<VecDeque<MessageEnvelope>>,
    capacity: usize,
    notify: Notify,
    stats: Arc<ConnectionStatistics>,
    closed: AtomicBool,
}

impl OutgoingQueue {
    pub fn new(capacity: usize, stats: Arc<ConnectionStatistics>) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Notify::new(),
            stats,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue at the tail. When full, the oldest non-Critical envelope is
    /// dropped (the absolute oldest if everything queued is Critical).
    pub fn push(&self, envelope: MessageEnvelope) {
        if self.closed.load(Ordering::Acquire) {
            self.stats.record_dropped();
            return;
        }
        {
            let mut queue = self.inner.lock();
            if queue.len() >= self.capacity {
                let victim = queue
                    .iter()
                    .position(|e| e.priority < Priority::Critical)
                    .unwrap_or(0);
                if let Some(dropped) = queue.remove(victim) {
                    debug!(
                        channel = %dropped.channel,
                        priority = %dropped.priority,
                        "queue full, dropping oldest"
                    );
                    self.stats.record_dropped();
                }
            }
            queue.push_back(envelope);
        }
        self.notify.notify_one();
    }

    /// Requeue at the head, preserving delivery order.
    pub fn push_front(&self, envelope: MessageEnvelope) {
        if self.closed.load(Ordering::Acquire) {
            self.stats.record_dropped();
            return;
        }
        self.inner.lock().push_front(envelope);
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<MessageEnvelope> {
        self.inner.lock().pop_front()
    }

    /// Pop the next envelope, waiting for one to arrive. Returns `None`
    /// once the queue is closed and drained, or on cancellation.
    pub async fn wait_pop(&self, cancel: &CancellationToken) -> Option<MessageEnvelope> {
        loop {
            // Register interest before checking, so a push between the
            // check and the await still wakes us.
            let notified = self.notify.notified();
            if let Some(envelope) = self.pop() {
                return Some(envelope);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = notified => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop accepting new envelopes. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
