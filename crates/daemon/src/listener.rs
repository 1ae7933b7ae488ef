// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the direct daemon socket.
//!
//! Serves fallback/CLI clients when the broker is down: one SystemCommand
//! frame in, one CommandResponse frame out, same dispatch table as the
//! bus path. Runs in a spawned task, handling each connection without
//! blocking the accept loop.

use crate::dispatch;
use crate::manager::ProcessManager;
use ghost_conn::direct::wire;
use ghost_core::SystemCommand;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

pub struct Listener {
    unix: UnixListener,
    manager: ProcessManager,
}

impl Listener {
    pub fn new(unix: UnixListener, manager: ProcessManager) -> Self {
        Self { unix, manager }
    }

    /// Accept connections until the manager shuts down.
    pub async fn run(self) {
        let cancel = self.manager.cancellation_token();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.unix.accept() => match accepted {
                    Ok((stream, _)) => {
                        let manager = self.manager.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, manager).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "socket accept failed"),
                }
            }
        }
        debug!("socket listener stopped");
    }
}

fn log_connection_error(e: wire::ProtocolError) {
    match e {
        wire::ProtocolError::ConnectionClosed => debug!("client disconnected"),
        wire::ProtocolError::Timeout => warn!("socket client timed out"),
        other => error!(error = %other, "socket connection error"),
    }
}

/// One command per connection: read, dispatch, reply.
async fn handle_connection(
    mut stream: UnixStream,
    manager: ProcessManager,
) -> Result<(), wire::ProtocolError> {
    let bytes = wire::read_frame(&mut stream, wire::DEFAULT_TIMEOUT).await?;
    let command: SystemCommand = wire::decode(&bytes)?;
    debug!(command = %command.command_type, "socket command received");

    let response = dispatch::handle_command(&manager, &command).await;
    let frame = wire::encode(&response)?;
    wire::write_frame(&mut stream, &frame, wire::DEFAULT_TIMEOUT).await
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
