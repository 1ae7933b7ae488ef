// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offline queueing: with the broker down, publishing never errors to the
//! caller; messages wait in the bounded queue, requeues are counted, and
//! the connection keeps trying in the background.

use super::support::*;
use ghost_conn::{GhostConnection, LinkState};
use ghost_core::test_support::registration;
use ghost_core::{Priority, ProcessId, SystemEvent};
use std::time::Duration;

#[tokio::test]
async fn offline_publishing_never_errors_and_requeues() {
    let bus = local_bus();
    bus.close().await; // broker down before the ghost starts

    let conn = GhostConnection::new(
        bus,
        registration("p1", "worker"),
        fast_connection_config(),
        None,
    );
    conn.start_reporting().await.unwrap();
    assert_eq!(conn.state(), LinkState::Reconnecting);

    // Publish a normal-priority event repeatedly; none of this throws.
    for i in 0..10u64 {
        conn.publish_event(
            &SystemEvent::ProcessStarted {
                process_id: ProcessId::from_string("p1"),
                timestamp_ms: i,
            },
            Priority::Normal,
        );
    }

    assert!(
        wait_for(|| conn.statistics().messages_requeued >= 1, Duration::from_secs(5)).await,
        "stats: {:?}",
        conn.statistics()
    );
    // Offline degradation is silent for the caller: no surfaced errors
    assert_eq!(conn.statistics().send_errors, 0);

    conn.shutdown().await;
}

#[tokio::test]
async fn queued_messages_deliver_once_the_broker_returns() {
    // Broker "outage" here is the window before the daemon subscribes:
    // the connection starts against a live bus with no daemon, queues
    // High-priority traffic, then the daemon side comes up.
    let bus = local_bus();

    let conn = GhostConnection::new(
        bus.clone(),
        registration("p1", "worker"),
        fast_connection_config(),
        None,
    );
    conn.start_reporting().await.unwrap();
    assert_eq!(conn.state(), LinkState::Reconnecting);

    conn.publish_event(
        &SystemEvent::ProcessStarted {
            process_id: ProcessId::from_string("p1"),
            timestamp_ms: 42,
        },
        Priority::High,
    );

    // Daemon comes up; the connection reconnects and drains its queue.
    let daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(
        wait_for(|| conn.state() == LinkState::Connected, Duration::from_secs(5)).await,
        "never reconnected: {:?}",
        conn.statistics()
    );
    assert!(
        wait_for(
            || daemon.find(&ProcessId::from_string("p1")).is_some(),
            Duration::from_secs(5)
        )
        .await,
        "registration never reached the daemon"
    );

    conn.shutdown().await;
}

#[tokio::test]
async fn queue_capacity_is_bounded_with_drop_oldest() {
    let bus = local_bus();
    bus.close().await;

    let config = ghost_conn::ConnectionConfig {
        queue_capacity: 5,
        ..fast_connection_config()
    };
    let conn = GhostConnection::new(bus, registration("p1", "worker"), config, None);
    conn.start_reporting().await.unwrap();

    for i in 0..50u64 {
        conn.publish_event(
            &SystemEvent::ProcessStarted {
                process_id: ProcessId::from_string("p1"),
                timestamp_ms: i,
            },
            Priority::Normal,
        );
    }

    assert!(conn.queue_len() <= 5);
    assert!(conn.statistics().messages_dropped >= 1);

    conn.shutdown().await;
}
