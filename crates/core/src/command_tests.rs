// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    ping = { "ping", Priority::High },
    register = { "register", Priority::High },
    stop = { "stop", Priority::High },
    start = { "start", Priority::Normal },
    list = { "list", Priority::Normal },
    unknown = { "frobnicate", Priority::Normal },
)]
fn command_priority_by_type(command_type: &str, expected: Priority) {
    let cmd = SystemCommand::new(command_type, 0);
    assert_eq!(cmd.priority(), expected);
}

#[test]
fn builder_sets_target_and_parameters() {
    let cmd = SystemCommand::new("stop", 7)
        .with_target(ProcessId::from_string("p42"))
        .with_parameter("timeout", "5000")
        .with_response_channel("ghost:responses:app-1:r1");

    assert_eq!(cmd.target_process_id, Some(ProcessId::from_string("p42")));
    assert_eq!(cmd.parameters.get("timeout").map(String::as_str), Some("5000"));
    assert_eq!(cmd.response_channel(), Some("ghost:responses:app-1:r1"));
}

#[test]
fn response_channel_absent_by_default() {
    assert_eq!(SystemCommand::new("ping", 0).response_channel(), None);
}

#[test]
fn command_round_trips_through_json() {
    let cmd = SystemCommand::new("register", 3).with_payload(vec![1, 2, 3]);
    let json = serde_json::to_string(&cmd).unwrap();
    let parsed: SystemCommand = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, cmd);
}

#[test]
fn response_data_uses_tagged_discriminator() {
    let response = CommandResponse::ok_with(
        CommandId::from_string("cmd-1"),
        ResponseData::Flag(true),
        9,
    );
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["data"]["kind"], "flag");
    assert_eq!(json["data"]["value"], true);
}

#[test]
fn timeout_response_is_failure_with_fixed_error() {
    let response = CommandResponse::timed_out(CommandId::from_string("cmd-1"), 0);
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Command timed out"));
}

#[test]
fn process_list_data_round_trips() {
    let state = ProcessState {
        id: ProcessId::from_string("p1"),
        name: "worker".into(),
        is_running: true,
        is_service: true,
        start_time_ms: Some(1),
        end_time_ms: None,
        last_metrics: None,
        last_seen_ms: Some(2),
    };
    let response = CommandResponse::ok_with(
        CommandId::from_string("cmd-2"),
        ResponseData::ProcessList(vec![state.clone()]),
        0,
    );
    let json = serde_json::to_string(&response).unwrap();
    let parsed: CommandResponse = serde_json::from_str(&json).unwrap();
    match parsed.data {
        Some(ResponseData::ProcessList(list)) => assert_eq!(list, vec![state]),
        other => panic!("unexpected data: {:?}", other),
    }
}
