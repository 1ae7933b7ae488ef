// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn status_activity_partition() {
    use ProcessStatus::*;
    for status in [Stopped, Starting, Running, Stopping, Crashed, Failed] {
        assert_ne!(status.is_active(), status.is_terminal());
    }
    assert!(Running.is_active());
    assert!(Crashed.is_terminal());
}

#[parameterized(
    start = { ProcessStatus::Stopped, ProcessStatus::Starting, true },
    spawn_ok = { ProcessStatus::Starting, ProcessStatus::Running, true },
    spawn_err = { ProcessStatus::Starting, ProcessStatus::Failed, true },
    graceful = { ProcessStatus::Running, ProcessStatus::Stopping, true },
    crash = { ProcessStatus::Running, ProcessStatus::Crashed, true },
    clean_exit = { ProcessStatus::Running, ProcessStatus::Stopped, true },
    stop_done = { ProcessStatus::Stopping, ProcessStatus::Stopped, true },
    restart_after_crash = { ProcessStatus::Crashed, ProcessStatus::Starting, true },
    skip_starting = { ProcessStatus::Stopped, ProcessStatus::Running, false },
    resurrect = { ProcessStatus::Stopped, ProcessStatus::Stopped, false },
    crash_while_stopped = { ProcessStatus::Stopped, ProcessStatus::Crashed, false },
)]
fn transition_table(from: ProcessStatus, to: ProcessStatus, legal: bool) {
    assert_eq!(from.can_transition(to), legal);
}

#[test]
fn process_type_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&ProcessType::Service).unwrap(), "\"service\"");
    let parsed: ProcessType = serde_json::from_str("\"daemon\"").unwrap();
    assert_eq!(parsed, ProcessType::Daemon);
}

#[test]
fn metadata_kind_serializes_as_type_field() {
    let meta = ProcessMetadata::new("worker", ProcessType::Service, "1.0.0");
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["type"], "service");
    assert_eq!(json["name"], "worker");
}

#[test]
fn restart_policy_defaults() {
    let policy = RestartPolicy::from_configuration(&HashMap::new());
    assert!(!policy.auto_restart);
    assert_eq!(policy.max_restart_attempts, 0);
    assert_eq!(policy.restart_delay_ms, 5_000);
}

#[test]
fn restart_policy_parses_wire_keys() {
    let mut config = HashMap::new();
    config.insert("AutoRestart".to_string(), "true".to_string());
    config.insert("MaxRestartAttempts".to_string(), "3".to_string());
    config.insert("restartDelayMs".to_string(), "250".to_string());

    let policy = RestartPolicy::from_configuration(&config);
    assert!(policy.auto_restart);
    assert_eq!(policy.max_restart_attempts, 3);
    assert_eq!(policy.restart_delay_ms, 250);
}

#[test]
fn restart_policy_attempt_budget() {
    let policy =
        RestartPolicy { auto_restart: true, max_restart_attempts: 2, restart_delay_ms: 0 };
    assert!(policy.allows_attempt(0));
    assert!(policy.allows_attempt(1));
    assert!(!policy.allows_attempt(2));

    let unlimited =
        RestartPolicy { auto_restart: true, max_restart_attempts: 0, restart_delay_ms: 0 };
    assert!(unlimited.allows_attempt(1_000));

    let disabled = RestartPolicy::default();
    assert!(!disabled.allows_attempt(0));
}

#[test]
fn registration_round_trips_through_json() {
    let mut config = HashMap::new();
    config.insert("AutoRestart".to_string(), "true".to_string());
    let registration = ProcessRegistration {
        id: ProcessId::from_string("p42"),
        name: "worker".to_string(),
        kind: ProcessType::Service,
        version: "1.0.0".to_string(),
        executable_path: None,
        arguments: vec![],
        working_directory: None,
        environment: HashMap::new(),
        configuration: config,
    };

    let json = serde_json::to_string(&registration).unwrap();
    let parsed: ProcessRegistration = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, registration);
    assert!(parsed.restart_policy().auto_restart);
}
