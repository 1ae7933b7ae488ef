// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ghost-core: Shared types for the Ghost process-supervision platform.
//!
//! Everything that crosses a crate boundary lives here: identifiers,
//! the wire message model (commands, responses, events, envelopes),
//! process metadata and metrics, channel naming, configuration, the
//! error taxonomy, and the clock abstraction used for testable time.

pub mod macros;

pub mod channel;
pub mod clock;
pub mod codec;
pub mod command;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod id;
pub mod metrics;
pub mod process;
pub mod stats;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use channel::{channel_matches, channels};
pub use clock::{Clock, FakeClock, SystemClock};
pub use codec::{from_json, from_payload, to_json, to_payload};
pub use command::{CommandResponse, ResponseData, SystemCommand, RESPONSE_CHANNEL_PARAM};
pub use config::{AppOptions, GhostConfig};
pub use envelope::{MessageEnvelope, Priority};
pub use error::GhostError;
pub use event::SystemEvent;
pub use id::{CommandId, ConnectionId, ProcessId};
pub use metrics::{HeartbeatMessage, ProcessMetrics};
pub use process::{
    ProcessMetadata, ProcessRegistration, ProcessState, ProcessStatus, ProcessType, RestartPolicy,
};
pub use stats::{ConnectionStatistics, StatisticsSnapshot};
