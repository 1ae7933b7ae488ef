// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ping round-trip with the daemon up: a ghost publishes a ping command
//! with a response channel and hears a matching success within the ping
//! deadline.

use super::support::*;
use ghost_core::channel::channels;
use ghost_core::{CommandResponse, SystemCommand};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn ping_round_trip_with_daemon_up() {
    let bus = local_bus();
    let _daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply_channel = "ghost:responses:app-1:r1";
    let mut replies = bus.subscribe::<CommandResponse>(reply_channel).await.unwrap();

    let cmd = SystemCommand::new("ping", 1).with_response_channel(reply_channel);
    let cmd_id = cmd.command_id;
    bus.publish(channels::COMMANDS, &cmd).await.unwrap();

    let cancel = CancellationToken::new();
    let reply = tokio::time::timeout(Duration::from_secs(5), replies.next(&cancel))
        .await
        .expect("no reply within the 5s ping deadline")
        .unwrap();
    assert_eq!(reply.command_id, cmd_id);
    assert!(reply.success);
}

#[tokio::test]
async fn unknown_commands_answer_with_the_fixed_error() {
    let bus = local_bus();
    let _daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply_channel = "ghost:responses:app-1:r2";
    let mut replies = bus.subscribe::<CommandResponse>(reply_channel).await.unwrap();

    let cmd = SystemCommand::new("definitely-not-a-command", 1)
        .with_response_channel(reply_channel);
    bus.publish(channels::COMMANDS, &cmd).await.unwrap();

    let cancel = CancellationToken::new();
    let reply = tokio::time::timeout(Duration::from_secs(2), replies.next(&cancel))
        .await
        .unwrap()
        .unwrap();
    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("unknown command"));
}
