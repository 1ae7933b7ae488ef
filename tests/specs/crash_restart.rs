// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash with restart: a supervised child exits nonzero; the daemon
//! observes the exit, publishes `process.crashed`, restarts it after the
//! jittered delay, and publishes `process.restarted` with count 1.

use super::support::*;
use ghost_core::channel::channels;
use ghost_core::{ProcessId, SystemEvent};
use ghost_daemon::ProcessSpec;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn crash_with_restart() {
    let bus = local_bus();
    let daemon = daemon_side(&bus);
    let mut events = bus.subscribe::<SystemEvent>(channels::EVENTS).await.unwrap();

    // A child that exits with code 7, restartable once with a short delay
    let mut spec = ProcessSpec::new(ProcessId::from_string("crasher"), "crasher", "/bin/sh");
    spec.arguments = vec!["-c".to_string(), "exit 7".to_string()];
    let process = daemon.adopt(spec);

    // Policy rides on the registration configuration
    let restart_config = [
        ("AutoRestart", "true"),
        ("MaxRestartAttempts", "3"),
        ("RestartDelayMs", "50"),
    ];
    {
        // register() refreshes the existing adopted entry's registration
        let mut registration =
            ghost_core::test_support::restartable_registration("crasher", "crasher", 3);
        for (k, v) in restart_config {
            registration.configuration.insert(k.to_string(), v.to_string());
        }
        // Keep the spawned process attached: only refresh config fields
        daemon.register(registration);
    }

    daemon.start(&ProcessId::from_string("crasher")).await.unwrap();

    assert!(
        wait_for(|| process.restart_count() >= 1, Duration::from_secs(10)).await,
        "restart never happened (status {:?})",
        process.status()
    );
    assert_eq!(process.restart_count(), 1);

    let cancel = CancellationToken::new();
    let mut crashed = false;
    let mut restarted = false;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(2), events.next(&cancel)).await
    {
        match event {
            SystemEvent::ProcessCrashed { process_id, .. }
                if process_id == ProcessId::from_string("crasher") =>
            {
                crashed = true;
            }
            SystemEvent::ProcessRestarted { process_id, restart_count, .. }
                if process_id == ProcessId::from_string("crasher") =>
            {
                assert_eq!(restart_count, 1);
                restarted = true;
                break;
            }
            _ => {}
        }
    }
    assert!(crashed, "process.crashed never seen");
    assert!(restarted, "process.restarted never seen");
}
