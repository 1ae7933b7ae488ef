// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration: `ghost.toml` overridden by `GHOST_*` environment
//! variables.
//!
//! One daemon serves a user; its state lives under the install root
//! (`GHOST_INSTALL`), falling back to `$XDG_STATE_HOME/ghost` and then
//! `$HOME/.local/state/ghost`.

use crate::error::GhostError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ENV_INSTALL: &str = "GHOST_INSTALL";
/// Daemon pid file name within the state dir.
pub const PID_FILE: &str = "ghostd.pid";
/// Daemon socket name within the state dir.
pub const SOCKET_FILE: &str = "ghostd.sock";
/// Daemon log file name within the state dir.
pub const LOG_FILE: &str = "ghostd.log";
pub const ENV_REDIS_CONNECTION: &str = "GHOST_REDIS_CONNECTION";
pub const ENV_POSTGRES_CONNECTION: &str = "GHOST_POSTGRES_CONNECTION";
pub const ENV_ENVIRONMENT: &str = "GHOST_ENV";

/// Platform-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostConfig {
    /// Deployment environment name (`dev`, `staging`, `prod`, ...)
    pub environment: String,
    /// Install root; also the state directory when set
    pub install_root: Option<PathBuf>,
    /// Remote broker/cache endpoint; absent = local bus over local cache
    pub redis_connection: Option<String>,
    /// SQL backend; absent = in-memory data core
    pub postgres_connection: Option<String>,
    /// Allow the connection to fall back to the direct daemon socket
    pub enable_fallback: bool,
    /// Run periodic connection diagnostics
    pub enable_diagnostics: bool,
    /// Let diagnostics spawn the daemon when it is not running
    pub auto_start_daemon: bool,
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            install_root: None,
            redis_connection: None,
            postgres_connection: None,
            enable_fallback: true,
            enable_diagnostics: true,
            auto_start_daemon: false,
        }
    }
}

impl GhostConfig {
    /// Load from `ghost.toml` in the current directory (when present),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, GhostError> {
        let mut config = match std::fs::read_to_string("ghost.toml") {
            Ok(text) => Self::parse(&text)?,
            Err(_) => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load from a specific toml file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, GhostError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GhostError::Configuration(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::parse(&text)?;
        config.apply_env();
        Ok(config)
    }

    fn parse(text: &str) -> Result<Self, GhostError> {
        toml::from_str(text).map_err(|e| GhostError::Configuration(e.to_string()))
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(ENV_ENVIRONMENT) {
            self.environment = v;
        }
        if let Ok(v) = std::env::var(ENV_INSTALL) {
            self.install_root = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var(ENV_REDIS_CONNECTION) {
            if !v.is_empty() {
                self.redis_connection = Some(v);
            }
        }
        if let Ok(v) = std::env::var(ENV_POSTGRES_CONNECTION) {
            if !v.is_empty() {
                self.postgres_connection = Some(v);
            }
        }
    }

    /// State directory: install root, else XDG state home, else
    /// `~/.local/state/ghost`, else a path under the temp dir.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(root) = &self.install_root {
            return root.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join("ghost");
            }
        }
        if let Ok(home) = std::env::var("HOME") {
            if !home.is_empty() {
                return PathBuf::from(home).join(".local").join("state").join("ghost");
            }
        }
        std::env::temp_dir().join("ghost")
    }
}

/// State directory resolved from the environment alone (no config file).
pub fn resolve_state_dir() -> PathBuf {
    let mut config = GhostConfig::default();
    config.apply_env();
    config.state_dir()
}

/// Per-application options, parsed from a process's configuration map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppOptions {
    /// Long-lived service vs one-shot app
    pub is_service: bool,
    /// Initialize the daemon connection on startup
    pub auto_ghost_father: bool,
    /// Report heartbeats and metrics while connected
    pub auto_monitor: bool,
    /// Service tick period
    pub tick_interval_seconds: u64,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            is_service: false,
            auto_ghost_father: true,
            auto_monitor: true,
            tick_interval_seconds: 5,
        }
    }
}

impl AppOptions {
    /// Parse from the wire-form configuration map (camelCase keys).
    pub fn from_configuration(configuration: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            configuration.get(key).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(default)
        };

        Self {
            is_service: flag("isService", defaults.is_service),
            auto_ghost_father: flag("autoGhostFather", defaults.auto_ghost_father),
            auto_monitor: flag("autoMonitor", defaults.auto_monitor),
            tick_interval_seconds: configuration
                .get("tickIntervalSeconds")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.tick_interval_seconds),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
