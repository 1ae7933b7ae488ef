// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture helpers shared by other crates' tests.

use crate::id::ProcessId;
use crate::process::{ProcessRegistration, ProcessType};
use std::collections::HashMap;

/// A minimal service registration for tests.
pub fn registration(id: &str, name: &str) -> ProcessRegistration {
    ProcessRegistration {
        id: ProcessId::from_string(id),
        name: name.to_string(),
        kind: ProcessType::Service,
        version: "1.0.0".to_string(),
        executable_path: None,
        arguments: vec![],
        working_directory: None,
        environment: HashMap::new(),
        configuration: HashMap::new(),
    }
}

/// A registration with restart policy keys set.
pub fn restartable_registration(id: &str, name: &str, max_attempts: u32) -> ProcessRegistration {
    let mut reg = registration(id, name);
    reg.configuration.insert("AutoRestart".to_string(), "true".to_string());
    reg.configuration
        .insert("MaxRestartAttempts".to_string(), max_attempts.to_string());
    reg
}
