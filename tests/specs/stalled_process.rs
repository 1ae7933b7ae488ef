// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stalled-process detection: a ghost that stops sending metrics is
//! marked stopped one sweep after the 10-second threshold, with its end
//! time pinned to the last signal.

use super::support::*;
use ghost_bus::Bus;
use ghost_cache::MemoryCache;
use ghost_core::test_support::registration;
use ghost_core::{Clock, FakeClock, ProcessId, ProcessMetrics};
use ghost_daemon::manager::DEFAULT_STALLED_THRESHOLD;
use ghost_daemon::ProcessManager;
use std::sync::Arc;
use std::time::Duration;

fn clocked_daemon(clock: FakeClock) -> ProcessManager<FakeClock> {
    let bus = Bus::local(Arc::new(MemoryCache::new()));
    ProcessManager::with_clock(bus, clock, DEFAULT_STALLED_THRESHOLD)
}

#[tokio::test]
async fn stalled_process_is_detected_at_the_threshold() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_000_000);
    let daemon = clocked_daemon(clock.clone());
    let id = ProcessId::from_string("p9");

    daemon.register(registration("p9", "worker"));

    // Metrics arrive, then stop at t0
    let t0 = clock.epoch_ms();
    daemon.note_metrics(ProcessMetrics::zero(id.clone(), t0));

    // 9.9s later: still running
    clock.advance(Duration::from_millis(9_900));
    daemon.sweep_once();
    assert!(daemon.find(&id).unwrap().is_running);

    // 10.1s later: stopped, end_time = last_seen
    clock.advance(Duration::from_millis(200));
    daemon.sweep_once();
    let state = daemon.find(&id).unwrap();
    assert!(!state.is_running);
    assert_eq!(state.end_time_ms, Some(t0));
    assert_eq!(state.last_seen_ms, Some(t0));
}

#[tokio::test]
async fn metrics_over_the_bus_feed_the_liveness_tracker() {
    let bus = local_bus();
    let daemon = daemon_side(&bus);
    tokio::time::sleep(Duration::from_millis(50)).await;

    daemon.register(registration("p5", "worker"));
    let before = daemon
        .find(&ProcessId::from_string("p5"))
        .and_then(|s| s.last_seen_ms)
        .unwrap_or(0);

    // A metrics sample published on the wire advances last_seen
    let sample = ProcessMetrics::zero(ProcessId::from_string("p5"), before + 5_000);
    bus.publish_binary("ghost:metrics:p5", &sample, ghost_core::Priority::Low)
        .await
        .unwrap();

    assert!(
        wait_for(
            || daemon
                .find(&ProcessId::from_string("p5"))
                .and_then(|s| s.last_seen_ms)
                .map(|seen| seen >= before + 5_000)
                .unwrap_or(false),
            Duration::from_secs(5)
        )
        .await
    );
    let state = daemon.find(&ProcessId::from_string("p5")).unwrap();
    assert_eq!(state.last_metrics.unwrap().timestamp_ms, before + 5_000);
}
