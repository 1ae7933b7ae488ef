// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload codecs.
//!
//! Two formats, chosen by what rides in them: compact binary (bincode) for
//! size-sensitive payloads (heartbeats, metrics, registration blobs), and
//! self-describing JSON for command/event envelopes.

use crate::error::GhostError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a size-sensitive payload to compact binary.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, GhostError> {
    bincode::serialize(value).map_err(|e| GhostError::Serialization(e.to_string()))
}

/// Decode a compact binary payload.
pub fn from_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GhostError> {
    bincode::deserialize(bytes).map_err(|e| GhostError::Serialization(e.to_string()))
}

/// Encode an envelope to self-describing JSON bytes.
pub fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, GhostError> {
    serde_json::to_vec(value).map_err(|e| GhostError::Serialization(e.to_string()))
}

/// Decode a JSON envelope.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GhostError> {
    serde_json::from_slice(bytes).map_err(|e| GhostError::Serialization(e.to_string()))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
