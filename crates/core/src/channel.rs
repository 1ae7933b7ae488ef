// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Channel naming and wildcard matching.
//!
//! The channel strings are the platform's wire contract; no compatibility
//! break is allowed. Builders keep the colon-joined structure in one place.

use crate::id::{ConnectionId, ProcessId};

/// Exact channel names and name builders.
pub mod channels {
    use super::*;

    /// SystemCommand stream, consumed by the daemon.
    pub const COMMANDS: &str = "ghost:commands";
    /// SystemEvent broadcast stream.
    pub const EVENTS: &str = "ghost:events";
    /// Registration lifecycle notifications.
    pub const REGISTRATION: &str = "ghost:registration";
    /// Shutdown lifecycle notifications.
    pub const SHUTDOWN: &str = "ghost:shutdown";
    /// Log shipping (reserved).
    pub const LOGS_PATTERN: &str = "ghost:logs:*";
    /// All per-process heartbeat channels.
    pub const HEALTH_PATTERN: &str = "ghost:health:*";
    /// All per-process metrics channels.
    pub const METRICS_PATTERN: &str = "ghost:metrics:*";

    /// Per-process event stream.
    pub fn events_for(id: &ProcessId) -> String {
        format!("ghost:events:{}", id)
    }

    /// Heartbeat and health-status messages for one process.
    pub fn health(id: &ProcessId) -> String {
        format!("ghost:health:{}", id)
    }

    /// Metrics samples for one process.
    pub fn metrics(id: &ProcessId) -> String {
        format!("ghost:metrics:{}", id)
    }

    /// Ephemeral per-request reply channel.
    pub fn responses(connection: &ConnectionId, token: &str) -> String {
        format!("ghost:responses:{}:{}", connection, token)
    }

    /// Cache key for an at-rest copy of a published message.
    pub fn message_key(channel: &str, token: &str) -> String {
        format!("message:{}:{}", channel, token)
    }

    /// Cache key tracking subscriber counts for a channel.
    pub fn subscribers_key(channel: &str) -> String {
        format!("subscribers:{}", channel)
    }

    /// Cache key of the active-channels set.
    pub const ACTIVE_CHANNELS_KEY: &str = "active_channels";
}

/// Match a subscription pattern against a concrete channel.
///
/// A pattern is either a literal channel name or `prefix:*`, which matches
/// one or more trailing segments (`ghost:metrics:*` matches
/// `ghost:metrics:p1` and `ghost:metrics:p1:cpu`, but not `ghost:metrics`).
pub fn channel_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix(":*") {
        Some(prefix) => {
            channel.len() > prefix.len() + 1
                && channel.starts_with(prefix)
                && channel.as_bytes()[prefix.len()] == b':'
        }
        None => pattern == channel,
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
