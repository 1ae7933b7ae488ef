// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn channel_pair() -> (mpsc::UnboundedSender<BusMessage>, Subscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Subscription::new("test:*".to_string(), rx))
}

#[tokio::test]
async fn raw_subscription_yields_in_send_order() {
    let (tx, mut sub) = channel_pair();
    tx.send(BusMessage { topic: "test:a".into(), payload: vec![1] }).unwrap();
    tx.send(BusMessage { topic: "test:b".into(), payload: vec![2] }).unwrap();

    assert_eq!(sub.recv().await.unwrap().payload, vec![1]);
    assert_eq!(sub.recv().await.unwrap().payload, vec![2]);
}

#[tokio::test]
async fn stream_ends_when_sender_drops() {
    let (tx, mut sub) = channel_pair();
    drop(tx);
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn try_recv_is_non_blocking() {
    let (tx, mut sub) = channel_pair();
    assert!(sub.try_recv().is_none());
    tx.send(BusMessage { topic: "test:a".into(), payload: vec![] }).unwrap();
    assert!(sub.try_recv().is_some());
}

#[tokio::test]
async fn typed_subscription_tracks_last_topic_and_skips_garbage() {
    let (tx, sub) = channel_pair();
    let mut typed = TypedSubscription::<u64>::json(sub);
    assert_eq!(typed.last_topic(), None);

    tx.send(BusMessage { topic: "test:bad".into(), payload: b"oops".to_vec() }).unwrap();
    tx.send(BusMessage { topic: "test:good".into(), payload: b"42".to_vec() }).unwrap();

    let cancel = CancellationToken::new();
    assert_eq!(typed.next(&cancel).await, Some(42));
    // last_topic reflects the decoded item, not the skipped one
    assert_eq!(typed.last_topic(), Some("test:good"));
}

#[tokio::test]
async fn binary_subscription_decodes_bincode() {
    let (tx, sub) = channel_pair();
    let mut typed = TypedSubscription::<u64>::binary(sub);

    let payload = ghost_core::to_payload(&7u64).unwrap();
    tx.send(BusMessage { topic: "test:x".into(), payload }).unwrap();

    let cancel = CancellationToken::new();
    assert_eq!(typed.next(&cancel).await, Some(7));
}

#[tokio::test]
async fn cancellation_wins_over_waiting() {
    let (_tx, sub) = channel_pair();
    let mut typed = TypedSubscription::<u64>::json(sub);
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_eq!(typed.next(&cancel).await, None);
}
