// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the Ghost crates.
//!
//! Per-crate error enums wrap these kinds where errors cross crate
//! boundaries. Cache misses are `Ok(None)`, never an error.

use thiserror::Error;

/// Canonical error kinds for the platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GhostError {
    #[error("storage connection failed: {0}")]
    StorageConnectionFailed(String),

    #[error("storage operation failed: {0}")]
    StorageOperationFailed(String),

    #[error("unauthorized access: {0}")]
    UnauthorizedAccess(String),

    #[error("insufficient permissions: {0}")]
    InsufficientPermissions(String),

    #[error("process start failed: {0}")]
    ProcessStartFailed(String),

    #[error("process terminated: {0}")]
    ProcessTerminated(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Unknown(String),
}

impl GhostError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Only connection-level failures and timeouts qualify; validation and
    /// contract violations never do.
    pub fn is_transient(&self) -> bool {
        matches!(self, GhostError::StorageConnectionFailed(_) | GhostError::Timeout(_))
    }

    /// Stable kind tag for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GhostError::StorageConnectionFailed(_) => "storage_connection_failed",
            GhostError::StorageOperationFailed(_) => "storage_operation_failed",
            GhostError::UnauthorizedAccess(_) => "unauthorized_access",
            GhostError::InsufficientPermissions(_) => "insufficient_permissions",
            GhostError::ProcessStartFailed(_) => "process_start_failed",
            GhostError::ProcessTerminated(_) => "process_terminated",
            GhostError::Configuration(_) => "configuration_error",
            GhostError::Validation(_) => "validation_error",
            GhostError::InvalidOperation(_) => "invalid_operation",
            GhostError::Process(_) => "process_error",
            GhostError::NotImplemented(_) => "not_implemented",
            GhostError::Serialization(_) => "serialization_error",
            GhostError::Timeout(_) => "timeout",
            GhostError::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
