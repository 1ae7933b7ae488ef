// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull-based subscription handles.
//!
//! A [`Subscription`] yields raw `(topic, payload)` pairs; a
//! [`TypedSubscription`] decodes them and skips (with a log line) anything
//! that fails to parse. The handle records the actual matched topic of the
//! most recent item, which is how wildcard subscribers learn where a
//! message came from.

use ghost_core::GhostError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The concrete channel the message was published on
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Raw byte-level subscription. Ends when the bus closes, the publisher
/// side drops it, or the caller cancels.
pub struct Subscription {
    pattern: String,
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(pattern: String, rx: mpsc::UnboundedReceiver<BusMessage>) -> Self {
        Self { pattern, rx }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Next message, or `None` on cancellation or bus termination.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Option<BusMessage> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Next message without an external cancellation signal.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for drain loops.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }
}

type DecodeFn<T> = fn(&[u8]) -> Result<T, GhostError>;

/// Typed subscription decoding each payload with a fixed codec.
pub struct TypedSubscription<T> {
    inner: Subscription,
    decode: DecodeFn<T>,
    last_topic: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> TypedSubscription<T> {
    pub(crate) fn json(inner: Subscription) -> Self {
        Self {
            inner,
            decode: ghost_core::from_json::<T>,
            last_topic: None,
            _marker: PhantomData,
        }
    }

    pub(crate) fn binary(inner: Subscription) -> Self {
        Self {
            inner,
            decode: ghost_core::from_payload::<T>,
            last_topic: None,
            _marker: PhantomData,
        }
    }

    pub fn pattern(&self) -> &str {
        self.inner.pattern()
    }

    /// The concrete topic of the most recently yielded item.
    pub fn last_topic(&self) -> Option<&str> {
        self.last_topic.as_deref()
    }

    /// Next decodable message. Malformed payloads are logged and skipped,
    /// never fatal.
    pub async fn next(&mut self, cancel: &CancellationToken) -> Option<T> {
        loop {
            let msg = self.inner.next(cancel).await?;
            match (self.decode)(&msg.payload) {
                Ok(value) => {
                    self.last_topic = Some(msg.topic);
                    return Some(value);
                }
                Err(e) => {
                    warn!(
                        topic = %msg.topic,
                        pattern = %self.inner.pattern(),
                        error = %e,
                        "skipping undecodable message"
                    );
                }
            }
        }
    }

    /// Next message without an external cancellation signal.
    pub async fn recv(&mut self) -> Option<T> {
        let cancel = CancellationToken::new();
        self.next(&cancel).await
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
