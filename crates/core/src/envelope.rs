// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outgoing-queue message envelope and priority bands.

use serde::{Deserialize, Serialize};

/// Delivery priority of a queued message.
///
/// Priority controls the retry budget and requeue policy of the outgoing
/// queue; it does not reorder the queue itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// Per-priority retry budget for queued envelopes.
    pub fn max_retries(self) -> u32 {
        match self {
            Priority::Low => 2,
            Priority::Normal => 5,
            Priority::High => 10,
            Priority::Critical => 20,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

crate::simple_display! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
}

/// A message queued for delivery to the daemon.
///
/// Invariant: `retry_count <= max_retries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Destination channel
    pub channel: String,
    /// Serialized message payload
    pub payload: Vec<u8>,
    /// Payload type tag for logging and diagnostics
    pub type_tag: String,
    pub priority: Priority,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
}

impl MessageEnvelope {
    pub fn new(
        channel: impl Into<String>,
        payload: Vec<u8>,
        type_tag: impl Into<String>,
        priority: Priority,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload,
            type_tag: type_tag.into(),
            priority,
            timestamp_ms,
            retry_count: 0,
            max_retries: priority.max_retries(),
        }
    }

    /// Whether the retry budget is spent.
    pub fn exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Consume one retry. Callers check [`exhausted`](Self::exhausted)
    /// first; the count saturates at the budget.
    pub fn requeued(mut self) -> Self {
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
