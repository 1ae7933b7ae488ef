// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command/response envelopes exchanged on `ghost:commands` and the
//! per-request `ghost:responses:{connectionId}:{uuid}` channels.
//!
//! These are self-describing JSON on the wire; large payloads (e.g.
//! registration blobs) ride in the binary `payload` field.

use crate::envelope::Priority;
use crate::id::{CommandId, ProcessId};
use crate::process::ProcessState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Parameters key holding the ephemeral reply topic, when the sender
/// expects a response.
pub const RESPONSE_CHANNEL_PARAM: &str = "responseChannel";

/// A command sent to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemCommand {
    pub command_id: CommandId,
    pub command_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_process_id: Option<ProcessId>,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl SystemCommand {
    pub fn new(command_type: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            command_id: CommandId::new(),
            command_type: command_type.into(),
            target_process_id: None,
            timestamp_ms,
            parameters: HashMap::new(),
            payload: None,
        }
    }

    pub fn with_target(mut self, target: ProcessId) -> Self {
        self.target_process_id = Some(target);
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_response_channel(self, channel: impl Into<String>) -> Self {
        self.with_parameter(RESPONSE_CHANNEL_PARAM, channel)
    }

    pub fn response_channel(&self) -> Option<&str> {
        self.parameters.get(RESPONSE_CHANNEL_PARAM).map(String::as_str)
    }

    /// Delivery priority by command type: control-plane commands that gate
    /// connectivity (`ping`, `register`, `stop`) go out High.
    pub fn priority(&self) -> Priority {
        match self.command_type.as_str() {
            "ping" | "register" | "stop" => Priority::High,
            _ => Priority::Normal,
        }
    }
}

/// Typed result payload of a [`CommandResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseData {
    ProcessState(ProcessState),
    ProcessList(Vec<ProcessState>),
    Text(String),
    Flag(bool),
}

/// Reply to a [`SystemCommand`], delivered on its response channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command_id: CommandId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl CommandResponse {
    pub fn ok(command_id: CommandId, timestamp_ms: u64) -> Self {
        Self { command_id, success: true, error: None, timestamp_ms, data: None }
    }

    pub fn ok_with(command_id: CommandId, data: ResponseData, timestamp_ms: u64) -> Self {
        Self { command_id, success: true, error: None, timestamp_ms, data: Some(data) }
    }

    pub fn failure(
        command_id: CommandId,
        error: impl Into<String>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            command_id,
            success: false,
            error: Some(error.into()),
            timestamp_ms,
            data: None,
        }
    }

    /// Synthetic response returned to callers when no reply arrived within
    /// the command deadline.
    pub fn timed_out(command_id: CommandId, timestamp_ms: u64) -> Self {
        Self::failure(command_id, "Command timed out", timestamp_ms)
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
