// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use crate::listener::Listener;
use crate::manager::ProcessManager;
use ghost_bus::Bus;
use ghost_cache::DiskCache;
use ghost_conn::{ConnectionConfig, GhostConnection};
use ghost_core::channel::channels;
use ghost_core::config as core_config;
use ghost_core::{
    Clock, GhostConfig, ProcessId, ProcessRegistration, ProcessType, SystemClock, SystemEvent,
};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

/// Daemon file layout under the state dir.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
    pub log_path: PathBuf,
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn from_ghost(ghost: &GhostConfig) -> Self {
        let state_dir = ghost.state_dir();
        Self {
            socket_path: state_dir.join(core_config::SOCKET_FILE),
            pid_path: state_dir.join(core_config::PID_FILE),
            log_path: state_dir.join(core_config::LOG_FILE),
            cache_dir: state_dir.join("cache"),
            state_dir,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): held to maintain the exclusive pid lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub bus: Bus,
    pub manager: ProcessManager,
    /// The daemon's own connection (daemon_self: reports like any ghost,
    /// skips registration and reconnects)
    pub connection: Arc<GhostConnection>,
    daemon_id: ProcessId,
}

/// Bring the daemon up: pid lock, bus, manager tasks, socket listener,
/// self connection, `daemon.started` announcement.
pub async fn startup(ghost: &GhostConfig) -> Result<DaemonState, LifecycleError> {
    let config = Config::from_ghost(ghost);
    std::fs::create_dir_all(&config.state_dir)?;

    // Exclusive pid lock: one daemon per state dir. Open without
    // truncating so a refused second daemon can't clobber the live pid.
    let mut lock_file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.pid_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    lock_file.write_all(std::process::id().to_string().as_bytes())?;
    lock_file.flush()?;

    let bus = build_bus(ghost, &config).await;
    let manager = ProcessManager::new(bus.clone());
    manager.spawn_tasks();

    // Stale socket from an unclean shutdown
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    let unix = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    tokio::spawn(Listener::new(unix, manager.clone()).run());

    let daemon_id = ProcessId::from_string("ghostd");
    let registration = ProcessRegistration {
        id: daemon_id.clone(),
        name: "ghostd".to_string(),
        kind: ProcessType::Daemon,
        version: env!("CARGO_PKG_VERSION").to_string(),
        executable_path: std::env::current_exe().ok(),
        arguments: vec![],
        working_directory: std::env::current_dir().ok(),
        environment: Default::default(),
        configuration: Default::default(),
    };
    let connection = GhostConnection::new(
        bus.clone(),
        registration,
        ConnectionConfig { state_dir: Some(config.state_dir.clone()), ..ConnectionConfig::daemon_self() },
        None,
    );
    if let Err(e) = connection.start_reporting().await {
        warn!(error = %e, "daemon self-connection failed to start");
    }

    let started = SystemEvent::DaemonStarted {
        process_id: daemon_id.clone(),
        timestamp_ms: SystemClock.epoch_ms(),
    };
    if let Err(e) = bus.publish(channels::EVENTS, &started).await {
        warn!(error = %e, "daemon.started publish failed");
    }

    info!(state_dir = %config.state_dir.display(), "daemon started");
    Ok(DaemonState { config, lock_file, bus, manager, connection, daemon_id })
}

/// Broker when configured and reachable, local bus otherwise.
async fn build_bus(ghost: &GhostConfig, config: &Config) -> Bus {
    if let Some(url) = &ghost.redis_connection {
        match Bus::redis(url).await {
            Ok(bus) => {
                info!("using remote broker bus");
                return bus;
            }
            Err(e) => {
                warn!(error = %e, "broker unreachable, falling back to local bus");
            }
        }
    }
    match DiskCache::open(&config.cache_dir) {
        Ok(cache) => {
            let cache = Arc::new(cache);
            cache.spawn_sweeper();
            Bus::local(cache)
        }
        Err(e) => {
            warn!(error = %e, "disk cache unavailable, using in-memory cache");
            Bus::local(Arc::new(ghost_cache::MemoryCache::new()))
        }
    }
}

impl DaemonState {
    /// Shutdown the daemon gracefully: announce, stop children, tear down
    /// the self connection, remove socket and pid files.
    pub async fn shutdown(&self) {
        info!("shutting down daemon");

        let stopping = SystemEvent::DaemonStopping {
            process_id: self.daemon_id.clone(),
            timestamp_ms: SystemClock.epoch_ms(),
        };
        for channel in [channels::EVENTS, channels::SHUTDOWN] {
            if let Err(e) = self.bus.publish(channel, &stopping).await {
                warn!(channel, error = %e, "daemon.stopping publish failed");
            }
        }

        self.manager.stop_all(std::time::Duration::from_secs(5)).await;
        self.connection.shutdown().await;
        self.bus.close().await;

        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.config.pid_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.pid_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }

        info!("daemon shutdown complete");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
