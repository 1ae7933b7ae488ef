// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::probe::ProbeCore;

fn encrypted(probe: &ProbeCore, key: &str) -> EncryptedData {
    EncryptedData::new(Arc::new(probe.clone()), key).unwrap()
}

#[tokio::test]
async fn values_round_trip_and_are_opaque_at_rest() {
    let probe = ProbeCore::new();
    let data = encrypted(&probe, "passphrase");

    data.kv_set("k", b"secret".to_vec(), None).await.unwrap();
    assert_eq!(data.kv_get("k").await.unwrap(), Some(b"secret".to_vec()));

    let at_rest = probe.state.lock().kv.get("k").cloned().unwrap();
    assert_ne!(at_rest, b"secret".to_vec());
    assert!(at_rest.len() > b"secret".len());
}

#[tokio::test]
async fn same_plaintext_encrypts_differently_each_time() {
    let probe = ProbeCore::new();
    let data = encrypted(&probe, "passphrase");

    data.kv_set("a", b"same".to_vec(), None).await.unwrap();
    data.kv_set("b", b"same".to_vec(), None).await.unwrap();

    let state = probe.state.lock();
    assert_ne!(state.kv.get("a"), state.kv.get("b"));
}

#[tokio::test]
async fn wrong_key_fails_decryption() {
    let probe = ProbeCore::new();
    let writer = encrypted(&probe, "key-one");
    writer.kv_set("k", b"secret".to_vec(), None).await.unwrap();

    let reader = encrypted(&probe, "key-two");
    let err = reader.kv_get("k").await.unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[tokio::test]
async fn base64_keys_of_32_bytes_are_used_directly() {
    use base64::Engine as _;
    let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
    let probe = ProbeCore::new();
    let data = encrypted(&probe, &key);

    data.kv_set("k", b"x".to_vec(), None).await.unwrap();
    assert_eq!(data.kv_get("k").await.unwrap(), Some(b"x".to_vec()));
}

#[test]
fn empty_key_is_rejected() {
    let probe = ProbeCore::new();
    let err = EncryptedData::new(Arc::new(probe), "").unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[tokio::test]
async fn sql_passes_through_untouched() {
    let probe = ProbeCore::new();
    probe.set_rows(vec![serde_json::json!({"x": 1})]);
    let data = encrypted(&probe, "passphrase");

    let rows = data.query("SELECT * FROM t", &[]).await.unwrap();
    assert_eq!(rows, vec![serde_json::json!({"x": 1})]);
}

#[tokio::test]
async fn batch_kv_round_trips() {
    let probe = ProbeCore::new();
    let data = encrypted(&probe, "passphrase");

    data.kv_set_many(
        vec![("a".to_string(), b"1".to_vec()), ("b".to_string(), b"2".to_vec())],
        None,
    )
    .await
    .unwrap();

    let values = data
        .kv_get_many(&["a".to_string(), "b".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(values, vec![Some(b"1".to_vec()), Some(b"2".to_vec()), None]);
}
