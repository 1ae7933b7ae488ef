// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Register-then-start: a ghost connects and registers; the daemon emits
//! `process.registered` on the broadcast channel, the per-process channel
//! sees `process.started`, and the registry lists the ghost as running.

use super::support::*;
use ghost_conn::GhostConnection;
use ghost_core::channel::channels;
use ghost_core::test_support::restartable_registration;
use ghost_core::{ProcessId, SystemEvent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn register_then_start() {
    let bus = local_bus();
    let daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut broadcast = bus.subscribe::<SystemEvent>(channels::EVENTS).await.unwrap();
    let mut per_process = bus.subscribe::<SystemEvent>("ghost:events:p42").await.unwrap();

    let registration = restartable_registration("p42", "worker", 3);
    let conn =
        GhostConnection::new(bus.clone(), registration, fast_connection_config(), None);
    conn.start_reporting().await.unwrap();

    // Registry shows the ghost running
    assert!(
        wait_for(
            || daemon
                .find(&ProcessId::from_string("p42"))
                .map(|s| s.is_running)
                .unwrap_or(false),
            Duration::from_secs(5)
        )
        .await,
        "p42 never appeared as running: {:?}",
        daemon.list()
    );

    // process.registered seen on the broadcast channel
    let cancel = CancellationToken::new();
    let mut saw_registered = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(2), broadcast.next(&cancel)).await {
            Ok(Some(event)) if event.type_name() == "process.registered" => {
                assert_eq!(event.process_id(), Some(&ProcessId::from_string("p42")));
                saw_registered = true;
                break;
            }
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_registered);

    // process.started seen on ghost:events:p42
    let mut saw_started = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(2), per_process.next(&cancel)).await {
            Ok(Some(event)) if event.type_name() == "process.started" => {
                saw_started = true;
                break;
            }
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_started);

    conn.shutdown().await;
}

#[tokio::test]
async fn heartbeats_keep_last_seen_fresh_in_the_registry() {
    let bus = local_bus();
    let daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let registration = restartable_registration("p7", "beater", 0);
    let conn =
        GhostConnection::new(bus.clone(), registration, fast_connection_config(), None);
    conn.start_reporting().await.unwrap();

    let initial_seen = daemon
        .find(&ProcessId::from_string("p7"))
        .and_then(|s| s.last_seen_ms)
        .unwrap_or(0);

    // Heartbeats fire every 50ms in the test config; last_seen must advance
    assert!(
        wait_for(
            || daemon
                .find(&ProcessId::from_string("p7"))
                .and_then(|s| s.last_seen_ms)
                .map(|seen| seen > initial_seen)
                .unwrap_or(false),
            Duration::from_secs(5)
        )
        .await
    );

    conn.shutdown().await;
}
