// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost-conn: the application-side link to the daemon.
//!
//! A [`GhostConnection`] keeps a bidirectional, at-least-once message pipe
//! over the bus: a bounded outgoing queue with per-priority retry budgets,
//! heartbeat/metrics/diagnostics timers, reconnection with jittered
//! exponential backoff, and an optional direct-socket fallback transport
//! when the broker is down.

pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod direct;
pub mod events;
pub mod queue;
pub mod sampler;

pub use config::{ConnectionConfig, ReconnectPolicy};
pub use connection::{GhostConnection, LinkState};
pub use diagnostics::{ConnectionDiagnosticResults, DiagnosticRequest, Diagnostics};
pub use direct::{DirectTransport, SocketTransport};
pub use events::ConnectionEvent;
pub use queue::OutgoingQueue;
pub use sampler::MetricsSampler;

use thiserror::Error;

/// Connection-layer errors.
///
/// Timer callbacks and the queue reader never surface these; they are
/// counted and logged. Only user-invoked operations return them.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("bus error: {0}")]
    Bus(#[from] ghost_bus::BusError),

    #[error("fallback transport error: {0}")]
    Fallback(String),

    #[error("connection is disposed")]
    Disposed,

    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Core(#[from] ghost_core::GhostError),
}
