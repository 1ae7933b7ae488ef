// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    connection = { GhostError::StorageConnectionFailed("down".into()), true },
    timeout = { GhostError::Timeout("ping".into()), true },
    operation = { GhostError::StorageOperationFailed("io".into()), false },
    validation = { GhostError::Validation("bad key".into()), false },
    invalid_op = { GhostError::InvalidOperation("double commit".into()), false },
)]
fn transience(err: GhostError, expected: bool) {
    assert_eq!(err.is_transient(), expected);
}

#[test]
fn display_includes_detail() {
    let err = GhostError::ProcessStartFailed("no such file".into());
    assert_eq!(err.to_string(), "process start failed: no such file");
}

#[test]
fn kind_tags_are_stable() {
    assert_eq!(GhostError::Timeout("x".into()).kind(), "timeout");
    assert_eq!(GhostError::Unknown("x".into()).kind(), "unknown");
}
