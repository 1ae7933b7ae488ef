// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CLI's view of the daemon: just another bus participant.
//!
//! With a broker configured, commands ride `ghost:commands` and replies
//! come back on an ephemeral response channel. Without one, the daemon's
//! direct socket serves the same dispatch table.

use anyhow::{anyhow, Context};
use ghost_bus::Bus;
use ghost_conn::{DirectTransport, SocketTransport};
use ghost_core::channel::channels;
use ghost_core::config as core_config;
use ghost_core::{
    CommandResponse, ConnectionId, GhostConfig, ProcessId, SystemClock, SystemCommand,
};
use ghost_core::Clock;
use std::collections::HashMap;
use std::time::Duration;

/// Reply deadline for CLI commands.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

pub enum Client {
    Bus { bus: Bus, id: ConnectionId },
    Socket(SocketTransport),
}

impl Client {
    /// Broker when configured, daemon socket otherwise.
    pub async fn from_config(config: &GhostConfig) -> anyhow::Result<Self> {
        if let Some(url) = &config.redis_connection {
            let bus = Bus::redis(url)
                .await
                .with_context(|| format!("connecting to broker at {}", url))?;
            return Ok(Client::Bus { bus, id: ConnectionId::new() });
        }
        let socket = config.state_dir().join(core_config::SOCKET_FILE);
        Ok(Client::Socket(SocketTransport::new(socket)))
    }

    pub async fn send(
        &self,
        command_type: &str,
        target: Option<ProcessId>,
        parameters: HashMap<String, String>,
    ) -> anyhow::Result<CommandResponse> {
        let mut cmd = SystemCommand::new(command_type, SystemClock.epoch_ms());
        cmd.target_process_id = target;
        cmd.parameters = parameters;

        match self {
            Client::Socket(transport) => transport
                .send_command(&cmd)
                .await
                .context("daemon socket unreachable (is ghostd running?)"),
            Client::Bus { bus, id } => {
                let reply = channels::responses(id, &uuid::Uuid::new_v4().to_string());
                let cmd = cmd.with_response_channel(&reply);
                let mut sub = bus
                    .subscribe::<CommandResponse>(&reply)
                    .await
                    .map_err(|e| anyhow!("subscribe failed: {}", e))?;
                bus.publish(channels::COMMANDS, &cmd)
                    .await
                    .map_err(|e| anyhow!("publish failed: {}", e))?;

                let deadline = tokio::time::Instant::now() + REPLY_TIMEOUT;
                loop {
                    let remaining =
                        deadline.saturating_duration_since(tokio::time::Instant::now());
                    if remaining.is_zero() {
                        return Err(anyhow!("no reply from daemon within {:?}", REPLY_TIMEOUT));
                    }
                    match tokio::time::timeout(remaining, sub.recv()).await {
                        Ok(Some(response)) if response.command_id == cmd.command_id => {
                            return Ok(response);
                        }
                        Ok(Some(_)) => continue,
                        Ok(None) | Err(_) => {
                            return Err(anyhow!(
                                "no reply from daemon within {:?}",
                                REPLY_TIMEOUT
                            ));
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
