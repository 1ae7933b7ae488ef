// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SystemCommand dispatcher.
//!
//! One subscriber on `ghost:commands`; every command is handled and its
//! reply published on the command's `responseChannel` with the matching
//! CommandId. Unknown types answer `Error="unknown command"`.

use crate::manager::ProcessManager;
use ghost_core::channel::channels;
use ghost_core::{
    Clock, CommandResponse, ProcessId, ProcessRegistration, ResponseData, SystemClock,
    SystemCommand,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Default graceful-stop timeout when the command doesn't carry one.
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the dispatcher until the manager shuts down.
pub fn spawn_dispatcher<C: Clock>(manager: ProcessManager<C>) {
    let cancel = manager.cancellation_token();
    tokio::spawn(async move {
        let bus = manager.bus().clone();
        let Ok(mut sub) = bus.subscribe::<SystemCommand>(channels::COMMANDS).await else {
            warn!("command subscription failed, dispatcher not running");
            return;
        };
        while let Some(cmd) = sub.next(&cancel).await {
            let response = handle_command(&manager, &cmd).await;
            match cmd.response_channel() {
                Some(reply) => {
                    if let Err(e) = bus.publish(reply, &response).await {
                        warn!(reply, error = %e, "response publish failed");
                    }
                }
                None => debug!(
                    command = %cmd.command_type,
                    "command carried no response channel"
                ),
            }
        }
        debug!("command dispatcher stopped");
    });
}

/// Handle one command.
pub async fn handle_command<C: Clock>(
    manager: &ProcessManager<C>,
    cmd: &SystemCommand,
) -> CommandResponse {
    let now = SystemClock.epoch_ms();
    debug!(command = %cmd.command_type, id = %cmd.command_id, "dispatching");

    match cmd.command_type.as_str() {
        "ping" => CommandResponse::ok(cmd.command_id, now),

        "register" => match decode_registration(cmd) {
            Ok(registration) => {
                let state = manager.register(registration);
                CommandResponse::ok_with(cmd.command_id, ResponseData::ProcessState(state), now)
            }
            Err(message) => CommandResponse::failure(cmd.command_id, message, now),
        },

        "start" => match target_id(cmd) {
            Some(id) => match manager.start(&id).await {
                Ok(()) => CommandResponse::ok(cmd.command_id, now),
                Err(e) => CommandResponse::failure(cmd.command_id, e.to_string(), now),
            },
            None => CommandResponse::failure(cmd.command_id, "missing target process", now),
        },

        "stop" => match target_id(cmd) {
            Some(id) => match manager.stop(&id, stop_timeout(cmd)).await {
                Ok(()) => CommandResponse::ok(cmd.command_id, now),
                Err(e) => CommandResponse::failure(cmd.command_id, e.to_string(), now),
            },
            None => CommandResponse::failure(cmd.command_id, "missing target process", now),
        },

        "restart" => match target_id(cmd) {
            Some(id) => match manager.restart(&id, stop_timeout(cmd)).await {
                Ok(()) => CommandResponse::ok(cmd.command_id, now),
                Err(e) => CommandResponse::failure(cmd.command_id, e.to_string(), now),
            },
            None => CommandResponse::failure(cmd.command_id, "missing target process", now),
        },

        "status" => match target_id(cmd) {
            Some(id) => match manager.find(&id) {
                Some(state) => CommandResponse::ok_with(
                    cmd.command_id,
                    ResponseData::ProcessState(state),
                    now,
                ),
                None => CommandResponse::failure(cmd.command_id, "unknown process", now),
            },
            None => CommandResponse::ok_with(
                cmd.command_id,
                ResponseData::ProcessList(manager.list()),
                now,
            ),
        },

        "list" | "discover" => CommandResponse::ok_with(
            cmd.command_id,
            ResponseData::ProcessList(manager.list()),
            now,
        ),

        other => {
            debug!(command = other, "unknown command type");
            CommandResponse::failure(cmd.command_id, "unknown command", now)
        }
    }
}

fn decode_registration(cmd: &SystemCommand) -> Result<ProcessRegistration, String> {
    let payload = cmd.payload.as_deref().ok_or("register requires a payload")?;
    // Registration blobs are compact binary; tolerate JSON for hand-rolled
    // clients.
    ghost_core::from_payload(payload)
        .or_else(|_| ghost_core::from_json(payload))
        .map_err(|e| format!("bad registration payload: {}", e))
}

fn target_id(cmd: &SystemCommand) -> Option<ProcessId> {
    cmd.target_process_id
        .clone()
        .or_else(|| cmd.parameters.get("processId").map(ProcessId::from_string))
}

fn stop_timeout(cmd: &SystemCommand) -> Duration {
    cmd.parameters
        .get("timeoutMs")
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_STOP_TIMEOUT)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
