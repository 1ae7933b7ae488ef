// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn shell_spec(id: &str, script: &str) -> ProcessSpec {
    let mut spec = ProcessSpec::new(ProcessId::from_string(id), id, "/bin/sh");
    spec.arguments = vec!["-c".to_string(), script.to_string()];
    spec
}

async fn wait_status(
    process: &Arc<SupervisedProcess>,
    expected: ProcessStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if process.status() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    process.status() == expected
}

#[tokio::test]
async fn clean_exit_transitions_to_stopped() {
    let process = SupervisedProcess::new(shell_spec("p1", "echo hello; exit 0"));
    process.start().await.unwrap();

    assert!(wait_status(&process, ProcessStatus::Stopped, Duration::from_secs(5)).await);
    assert!(process.stop_time_ms().is_some());
    assert!(process.last_error().is_none());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(process.stdout_lines(), vec!["hello"]);
}

#[tokio::test]
async fn nonzero_exit_transitions_to_crashed() {
    let process = SupervisedProcess::new(shell_spec("p2", "echo boom >&2; exit 7"));
    process.start().await.unwrap();

    assert!(wait_status(&process, ProcessStatus::Crashed, Duration::from_secs(5)).await);
    assert_eq!(process.last_error().as_deref(), Some("process exited with code 7"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(process.stderr_lines(), vec!["boom"]);
}

#[tokio::test]
async fn missing_executable_fails_start() {
    let mut spec = ProcessSpec::new(ProcessId::from_string("p3"), "p3", "/no/such/binary");
    spec.arguments = vec![];
    let process = SupervisedProcess::new(spec);

    let err = process.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::StartFailed(_)));
    assert_eq!(process.status(), ProcessStatus::Failed);
    assert!(process.last_error().is_some());
}

#[tokio::test]
async fn double_start_is_a_noop() {
    let process = SupervisedProcess::new(shell_spec("p4", "sleep 10"));
    process.start().await.unwrap();
    assert_eq!(process.status(), ProcessStatus::Running);

    // Second start while running: warning, no error, still the same run
    process.start().await.unwrap();
    assert_eq!(process.status(), ProcessStatus::Running);

    process.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn graceful_stop_is_fast_for_cooperative_processes() {
    let process = SupervisedProcess::new(shell_spec("p5", "sleep 30"));
    process.start().await.unwrap();

    let started = tokio::time::Instant::now();
    process.stop(Duration::from_secs(10)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(process.status(), ProcessStatus::Stopped);
    assert!(process.stop_time_ms().is_some());
}

#[tokio::test]
async fn stubborn_process_gets_the_kill_escalation() {
    let process = SupervisedProcess::new(shell_spec(
        "p6",
        "trap '' TERM; while true; do sleep 0.1; done",
    ));
    process.start().await.unwrap();
    // Give the shell a moment to install its trap
    tokio::time::sleep(Duration::from_millis(200)).await;

    process.stop(Duration::from_millis(300)).await.unwrap();
    assert_eq!(process.status(), ProcessStatus::Stopped);
}

#[tokio::test]
async fn stop_when_already_stopped_is_a_noop() {
    let process = SupervisedProcess::new(shell_spec("p7", "exit 0"));
    process.start().await.unwrap();
    assert!(wait_status(&process, ProcessStatus::Stopped, Duration::from_secs(5)).await);

    process.stop(Duration::from_secs(1)).await.unwrap();
    process.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(process.status(), ProcessStatus::Stopped);
}

#[tokio::test]
async fn restart_increments_the_counter() {
    let process = SupervisedProcess::new(shell_spec("p8", "sleep 10"));
    process.start().await.unwrap();

    process.restart(Duration::from_secs(5)).await.unwrap();
    assert_eq!(process.status(), ProcessStatus::Running);
    assert_eq!(process.restart_count(), 1);

    process.stop(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn observed_transitions_form_a_legal_path() {
    let process = SupervisedProcess::new(shell_spec("p9", "exit 3"));
    let mut status_rx = process.subscribe_status();
    process.start().await.unwrap();
    assert!(wait_status(&process, ProcessStatus::Crashed, Duration::from_secs(5)).await);

    let mut transitions = Vec::new();
    while let Ok(change) = status_rx.try_recv() {
        assert!(change.from.can_transition(change.to), "{:?}", change);
        transitions.push(change.to);
    }
    assert_eq!(
        transitions,
        vec![ProcessStatus::Starting, ProcessStatus::Running, ProcessStatus::Crashed]
    );
}

#[tokio::test]
async fn output_ring_drops_oldest_lines() {
    let mut spec = shell_spec("p10", "for i in 1 2 3 4 5; do echo line$i; done");
    spec.max_buffer_size = 2;
    let process = SupervisedProcess::new(spec);
    process.start().await.unwrap();
    assert!(wait_status(&process, ProcessStatus::Stopped, Duration::from_secs(5)).await);

    // Give the capture task a beat to drain the pipe
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(process.stdout_lines(), vec!["line4", "line5"]);
}

#[tokio::test]
async fn wait_for_exit_returns_terminal_status() {
    let process = SupervisedProcess::new(shell_spec("p11", "exit 0"));
    process.start().await.unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), process.wait_for_exit())
        .await
        .unwrap();
    assert_eq!(status, ProcessStatus::Stopped);
}

#[tokio::test]
async fn dispose_kills_and_is_idempotent() {
    let process = SupervisedProcess::new(shell_spec("p12", "sleep 30"));
    process.start().await.unwrap();

    process.dispose().await;
    process.dispose().await;
    assert_eq!(process.status(), ProcessStatus::Stopped);
    assert!(process.stdout_lines().is_empty());

    let err = process.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::InvalidOperation(_)));
}

#[tokio::test]
async fn crash_restart_notes_count() {
    let process = SupervisedProcess::new(shell_spec("p13", "sleep 10"));
    assert_eq!(process.note_restart(), 1);
    assert_eq!(process.note_restart(), 2);
    assert_eq!(process.restart_count(), 2);
}
