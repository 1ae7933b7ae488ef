// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Direct (fallback) transport to the daemon.
//!
//! When the broker is unreachable, commands can still reach the daemon
//! over its Unix socket. One frame out (the command), one frame back
//! (the response); the codec lives in [`wire`].

pub mod wire;

use crate::ConnectionError;
use async_trait::async_trait;
use ghost_core::{CommandResponse, SystemCommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::debug;

/// Pluggable fallback transport.
#[async_trait]
pub trait DirectTransport: Send + Sync {
    /// Cheap reachability probe.
    async fn test_connection(&self) -> bool;

    /// Send one command and wait for its response.
    async fn send_command(
        &self,
        command: &SystemCommand,
    ) -> Result<CommandResponse, ConnectionError>;
}

/// Unix-socket transport speaking length-prefixed JSON frames.
pub struct SocketTransport {
    socket_path: PathBuf,
    timeout: Duration,
}

impl SocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into(), timeout: wire::DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn socket_path(&self) -> &std::path::Path {
        &self.socket_path
    }
}

#[async_trait]
impl DirectTransport for SocketTransport {
    async fn test_connection(&self) -> bool {
        match tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(path = %self.socket_path.display(), error = %e, "socket probe failed");
                false
            }
            Err(_) => false,
        }
    }

    async fn send_command(
        &self,
        command: &SystemCommand,
    ) -> Result<CommandResponse, ConnectionError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ConnectionError::Fallback(e.to_string()))?;

        let frame = wire::encode(command).map_err(|e| ConnectionError::Fallback(e.to_string()))?;
        wire::write_frame(&mut stream, &frame, self.timeout)
            .await
            .map_err(|e| ConnectionError::Fallback(e.to_string()))?;

        let bytes = wire::read_frame(&mut stream, self.timeout)
            .await
            .map_err(|e| ConnectionError::Fallback(e.to_string()))?;
        wire::decode(&bytes).map_err(|e| ConnectionError::Fallback(e.to_string()))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
