// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_connection_id_has_prefix_and_uuid_body() {
    let id = ConnectionId::new();
    assert!(id.as_str().starts_with("app-"));
    assert_eq!(id.as_str().len(), 40);
    assert!(uuid::Uuid::parse_str(id.suffix()).is_ok());
}

#[test]
fn two_generated_ids_differ() {
    assert_ne!(CommandId::new(), CommandId::new());
}

#[test]
fn process_id_accepts_free_form_names() {
    let id = ProcessId::from_string("p42");
    assert_eq!(id.as_str(), "p42");
    assert_eq!(id.suffix(), "p42");
    assert!(!id.is_empty());
}

#[test]
fn from_str_and_string_conversions() {
    let a: ProcessId = "worker-1".into();
    let b: ProcessId = String::from("worker-1").into();
    assert_eq!(a, b);
    assert_eq!(a, "worker-1");
}

#[test]
fn suffix_strips_only_the_type_prefix() {
    let id = CommandId::from_string("cmd-0123");
    assert_eq!(id.suffix(), "0123");
    // Foreign prefixes are left intact
    assert_eq!(ProcessId::from_string("p42").suffix(), "p42");
}

#[test]
fn serde_round_trip_is_transparent() {
    let id = ConnectionId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id.as_str()));
    let parsed: ConnectionId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn deserialize_rejects_oversized_ids() {
    let long = format!("\"{}\"", "x".repeat(ID_MAX_LEN + 1));
    assert!(serde_json::from_str::<ProcessId>(&long).is_err());
}

#[test]
fn borrow_matches_hashmap_str_lookup() {
    let mut map = std::collections::HashMap::new();
    map.insert(ProcessId::from_string("p1"), 7);
    assert_eq!(map.get("p1"), Some(&7));
}

#[test]
fn empty_ids_report_empty() {
    assert!(ProcessId::from_string("").is_empty());
    assert!(!ProcessId::new().is_empty());
}
