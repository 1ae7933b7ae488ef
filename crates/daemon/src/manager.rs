// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authoritative registry of supervised processes.
//!
//! Entries come from registrations: either external ghosts that manage
//! their own OS process (tracked by heartbeat/metrics liveness) or specs
//! the daemon spawns and supervises itself. The manager routes commands,
//! re-broadcasts lifecycle events on `ghost:events` and
//! `ghost:events:{id}`, sweeps stalled entries, and drives the restart
//! policy for crashed children.

use crate::process::{ProcessSpec, StatusChanged, SupervisedProcess};
use ghost_bus::Bus;
use ghost_core::channel::channels;
use ghost_core::{
    Clock, GhostError, HeartbeatMessage, ProcessId, ProcessMetrics, ProcessRegistration,
    ProcessState, ProcessStatus, RestartPolicy, SystemClock, SystemEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default sweep cadence and stall threshold.
pub const DEFAULT_STALLED_THRESHOLD: Duration = Duration::from_secs(10);
/// A run longer than this resets the restart counter before counting the
/// next attempt.
const STABLE_RUN: Duration = Duration::from_secs(5 * 60);
/// Per-attempt cap on the crash-restart delay.
const MAX_RESTART_DELAY: Duration = Duration::from_secs(30);

struct Entry {
    registration: ProcessRegistration,
    /// Present when the daemon spawned (or can spawn) the process itself
    process: Option<Arc<SupervisedProcess>>,
    /// Liveness status for external ghosts (their OS handle is not ours)
    external_status: ProcessStatus,
    last_seen_ms: Option<u64>,
    last_metrics: Option<ProcessMetrics>,
    start_time_ms: Option<u64>,
    end_time_ms: Option<u64>,
    restart_count: u32,
}

impl Entry {
    fn policy(&self) -> RestartPolicy {
        self.registration.restart_policy()
    }

    fn state(&self) -> ProcessState {
        match &self.process {
            Some(process) => {
                let mut state = process.state();
                state.last_seen_ms = self.last_seen_ms;
                state.last_metrics = self.last_metrics.clone();
                state
            }
            None => ProcessState {
                id: self.registration.id.clone(),
                name: self.registration.name.clone(),
                is_running: self.external_status == ProcessStatus::Running,
                is_service: self.registration.kind.is_service(),
                start_time_ms: self.start_time_ms,
                end_time_ms: self.end_time_ms,
                last_metrics: self.last_metrics.clone(),
                last_seen_ms: self.last_seen_ms,
            },
        }
    }
}

struct ManagerInner<C: Clock> {
    bus: Bus,
    clock: C,
    entries: Mutex<HashMap<ProcessId, Entry>>,
    stalled_threshold: Duration,
    cancel: CancellationToken,
}

/// Cloneable handle to the registry.
pub struct ProcessManager<C: Clock = SystemClock> {
    inner: Arc<ManagerInner<C>>,
}

impl<C: Clock> Clone for ProcessManager<C> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl ProcessManager<SystemClock> {
    pub fn new(bus: Bus) -> Self {
        Self::with_clock(bus, SystemClock, DEFAULT_STALLED_THRESHOLD)
    }
}

impl<C: Clock> ProcessManager<C> {
    pub fn with_clock(bus: Bus, clock: C, stalled_threshold: Duration) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                bus,
                clock,
                entries: Mutex::new(HashMap::new()),
                stalled_threshold,
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Materialize a new or refreshed entry. Idempotent: a re-registration
    /// refreshes the registration and marks the ghost alive again.
    pub fn register(&self, registration: ProcessRegistration) -> ProcessState {
        let now = self.inner.clock.epoch_ms();
        let id = registration.id.clone();
        let state = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(id.clone()).or_insert_with(|| Entry {
                registration: registration.clone(),
                process: None,
                external_status: ProcessStatus::Running,
                last_seen_ms: Some(now),
                last_metrics: None,
                start_time_ms: Some(now),
                end_time_ms: None,
                restart_count: 0,
            });
            // Refresh: the ghost re-announced itself.
            entry.registration = registration;
            entry.last_seen_ms = Some(now);
            if entry.process.is_none() {
                entry.external_status = ProcessStatus::Running;
                entry.end_time_ms = None;
                if entry.start_time_ms.is_none() {
                    entry.start_time_ms = Some(now);
                }
            }
            entry.state()
        };

        info!(id = %id, name = %state.name, "process registered");
        let event = SystemEvent::ProcessRegistered {
            process_id: id,
            data: Vec::new(),
            timestamp_ms: now,
        };
        // Registration also lands on the dedicated lifecycle channel.
        {
            let bus = self.inner.bus.clone();
            let event = event.clone();
            tokio::spawn(async move {
                let _ = bus.publish(channels::REGISTRATION, &event).await;
            });
        }
        self.emit(event);
        state
    }

    /// Adopt a daemon-spawned process spec: registers and supervises it.
    pub fn adopt(&self, spec: ProcessSpec) -> Arc<SupervisedProcess> {
        let now = self.inner.clock.epoch_ms();
        let registration = ProcessRegistration {
            id: spec.id.clone(),
            name: spec.name.clone(),
            kind: spec.kind,
            version: String::new(),
            executable_path: Some(spec.executable.clone()),
            arguments: spec.arguments.clone(),
            working_directory: spec.working_directory.clone(),
            environment: spec.environment.clone(),
            configuration: HashMap::new(),
        };
        let process = SupervisedProcess::new(spec);
        self.watch_status(&process);
        self.inner.entries.lock().insert(
            process.id().clone(),
            Entry {
                registration,
                process: Some(Arc::clone(&process)),
                external_status: ProcessStatus::Stopped,
                last_seen_ms: None,
                last_metrics: None,
                start_time_ms: None,
                end_time_ms: None,
                restart_count: 0,
            },
        );
        process
    }

    fn find_process(&self, id: &ProcessId) -> Option<Arc<SupervisedProcess>> {
        self.inner.entries.lock().get(id).and_then(|entry| entry.process.clone())
    }

    pub async fn start(&self, id: &ProcessId) -> Result<(), GhostError> {
        let process = self
            .find_process(id)
            .ok_or_else(|| GhostError::Validation(format!("no startable process {}", id)))?;
        process.start().await?;
        self.emit(SystemEvent::ProcessStarted {
            process_id: id.clone(),
            timestamp_ms: self.inner.clock.epoch_ms(),
        });
        Ok(())
    }

    pub async fn stop(&self, id: &ProcessId, timeout: Duration) -> Result<(), GhostError> {
        let process = match self.find_process(id) {
            Some(process) => process,
            None => {
                // External ghost: mark it stopped; it is told via its own
                // event channel.
                let now = self.inner.clock.epoch_ms();
                let mut entries = self.inner.entries.lock();
                let entry = entries
                    .get_mut(id)
                    .ok_or_else(|| GhostError::Validation(format!("unknown process {}", id)))?;
                entry.external_status = ProcessStatus::Stopped;
                entry.end_time_ms = Some(now);
                drop(entries);
                self.emit(SystemEvent::ProcessStopped {
                    process_id: id.clone(),
                    exit_code: None,
                    timestamp_ms: now,
                });
                return Ok(());
            }
        };
        process.stop(timeout).await?;
        self.emit(SystemEvent::ProcessStopped {
            process_id: id.clone(),
            exit_code: None,
            timestamp_ms: self.inner.clock.epoch_ms(),
        });
        Ok(())
    }

    pub async fn restart(&self, id: &ProcessId, timeout: Duration) -> Result<(), GhostError> {
        let process = self
            .find_process(id)
            .ok_or_else(|| GhostError::Validation(format!("no restartable process {}", id)))?;
        process.restart(timeout).await?;
        self.emit(SystemEvent::ProcessRestarted {
            process_id: id.clone(),
            restart_count: process.restart_count(),
            timestamp_ms: self.inner.clock.epoch_ms(),
        });
        Ok(())
    }

    /// Snapshot of every entry.
    pub fn list(&self) -> Vec<ProcessState> {
        let entries = self.inner.entries.lock();
        let mut states: Vec<ProcessState> = entries.values().map(Entry::state).collect();
        states.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        states
    }

    pub fn find(&self, id: &ProcessId) -> Option<ProcessState> {
        self.inner.entries.lock().get(id).map(Entry::state)
    }

    /// Record a liveness signal for an entry.
    pub fn note_seen(&self, id: &ProcessId, seen_ms: u64) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.get_mut(id) {
            entry.last_seen_ms = Some(entry.last_seen_ms.unwrap_or(0).max(seen_ms));
            if entry.process.is_none() && entry.external_status != ProcessStatus::Running {
                entry.external_status = ProcessStatus::Running;
                entry.end_time_ms = None;
            }
        }
    }

    /// Record a metrics sample (also counts as liveness).
    pub fn note_metrics(&self, sample: ProcessMetrics) {
        let id = sample.process_id.clone();
        let seen = sample.timestamp_ms;
        {
            let mut entries = self.inner.entries.lock();
            if let Some(entry) = entries.get_mut(&id) {
                entry.last_metrics = Some(sample);
            }
        }
        self.note_seen(&id, seen);
    }

    /// One sweep pass: Running entries whose last signal is older than the
    /// stall threshold become Stopped with `end_time = last_seen`.
    pub fn sweep_once(&self) -> usize {
        let now = self.inner.clock.epoch_ms();
        let threshold_ms = self.inner.stalled_threshold.as_millis() as u64;
        let mut stalled = Vec::new();
        {
            let mut entries = self.inner.entries.lock();
            for (id, entry) in entries.iter_mut() {
                if entry.process.is_some() {
                    // Daemon-spawned children have a real exit handler.
                    continue;
                }
                if entry.external_status != ProcessStatus::Running {
                    continue;
                }
                let Some(last_seen) = entry.last_seen_ms else { continue };
                if now.saturating_sub(last_seen) > threshold_ms {
                    entry.external_status = ProcessStatus::Stopped;
                    entry.end_time_ms = Some(last_seen);
                    stalled.push((id.clone(), last_seen));
                }
            }
        }
        for (id, last_seen) in &stalled {
            warn!(id = %id, last_seen_ms = last_seen, "process stalled, marking stopped");
            self.emit(SystemEvent::HealthStatusChanged {
                process_id: id.clone(),
                healthy: false,
                timestamp_ms: now,
            });
        }
        stalled.len()
    }

    /// Spawn the background loops: liveness listeners, the stall sweeper,
    /// and the command dispatcher.
    pub fn spawn_tasks(&self) {
        self.spawn_liveness_listeners();
        self.spawn_sweeper();
        crate::dispatch::spawn_dispatcher(self.clone());
    }

    fn spawn_sweeper(&self) {
        let manager = self.clone();
        let cancel = self.inner.cancel.clone();
        let period = self.inner.stalled_threshold;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => { manager.sweep_once(); }
                }
            }
        });
    }

    fn spawn_liveness_listeners(&self) {
        // Heartbeats
        {
            let manager = self.clone();
            let cancel = self.inner.cancel.clone();
            tokio::spawn(async move {
                let Ok(mut sub) = manager
                    .inner
                    .bus
                    .subscribe_binary::<HeartbeatMessage>(channels::HEALTH_PATTERN)
                    .await
                else {
                    warn!("health subscription failed");
                    return;
                };
                while let Some(beat) = sub.next(&cancel).await {
                    manager.note_seen(&beat.id, beat.timestamp_ms);
                }
            });
        }
        // Metrics
        {
            let manager = self.clone();
            let cancel = self.inner.cancel.clone();
            tokio::spawn(async move {
                let Ok(mut sub) = manager
                    .inner
                    .bus
                    .subscribe_binary::<ProcessMetrics>(channels::METRICS_PATTERN)
                    .await
                else {
                    warn!("metrics subscription failed");
                    return;
                };
                while let Some(sample) = sub.next(&cancel).await {
                    manager.note_metrics(sample);
                }
            });
        }
    }

    /// Watch a supervised child's transitions: re-broadcast crashes and
    /// apply the restart policy.
    fn watch_status(&self, process: &Arc<SupervisedProcess>) {
        let manager = self.clone();
        let process = Arc::clone(process);
        let mut status_rx = process.subscribe_status();
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            loop {
                let change = tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = status_rx.recv() => match change {
                        Ok(change) => change,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                };
                if change.to == ProcessStatus::Crashed {
                    manager.on_crashed(&process, &change).await;
                }
            }
        });
    }

    async fn on_crashed(&self, process: &Arc<SupervisedProcess>, change: &StatusChanged) {
        let id = process.id().clone();
        self.emit(SystemEvent::ProcessCrashed {
            process_id: id.clone(),
            exit_code: None,
            error: process.last_error(),
            timestamp_ms: change.at_ms,
        });

        let policy = {
            let entries = self.inner.entries.lock();
            match entries.get(&id) {
                Some(entry) => entry.policy(),
                None => return,
            }
        };

        // A long stable run forgives earlier crashes.
        let run_ms = process
            .stop_time_ms()
            .zip(process.start_time_ms())
            .map(|(stop, start)| stop.saturating_sub(start))
            .unwrap_or(0);
        if run_ms > STABLE_RUN.as_millis() as u64 && process.restart_count() > 1 {
            process.reset_restart_count(1);
        }

        let restarts = process.restart_count();
        if !policy.allows_attempt(restarts) {
            if policy.auto_restart {
                warn!(id = %id, restarts, "restart budget exhausted");
                self.emit(SystemEvent::ProcessFailed {
                    process_id: id,
                    reason: format!("restart budget exhausted after {} attempts", restarts),
                    timestamp_ms: self.inner.clock.epoch_ms(),
                });
            }
            return;
        }

        let delay = restart_delay(policy.restart_delay_ms, restarts);
        debug!(id = %id, restarts, delay_ms = delay.as_millis() as u64, "scheduling crash restart");

        let manager = self.clone();
        let process = Arc::clone(process);
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            match process.start().await {
                Ok(()) => {
                    let count = process.note_restart();
                    manager.set_restart_count(process.id(), count);
                    info!(id = %process.id(), count, "crash restart succeeded");
                    manager.emit(SystemEvent::ProcessRestarted {
                        process_id: process.id().clone(),
                        restart_count: count,
                        timestamp_ms: manager.inner.clock.epoch_ms(),
                    });
                }
                Err(e) => {
                    warn!(id = %process.id(), error = %e, "crash restart failed");
                    manager.emit(SystemEvent::ProcessFailed {
                        process_id: process.id().clone(),
                        reason: e.to_string(),
                        timestamp_ms: manager.inner.clock.epoch_ms(),
                    });
                }
            }
        });
    }

    fn set_restart_count(&self, id: &ProcessId, count: u32) {
        if let Some(entry) = self.inner.entries.lock().get_mut(id) {
            entry.restart_count = count;
        }
    }

    /// Fire an event on `ghost:events` and the per-process channel.
    fn emit(&self, event: SystemEvent) {
        let bus = self.inner.bus.clone();
        tokio::spawn(async move {
            if let Err(e) = bus.publish(channels::EVENTS, &event).await {
                debug!(error = %e, event = event.type_name(), "event publish failed");
                return;
            }
            if let Some(id) = event.process_id() {
                let channel = channels::events_for(id);
                if let Err(e) = bus.publish(&channel, &event).await {
                    debug!(error = %e, channel = %channel, "event publish failed");
                }
            }
        });
    }

    /// Stop every supervised child (used at daemon shutdown).
    pub async fn stop_all(&self, timeout: Duration) {
        let processes: Vec<Arc<SupervisedProcess>> = {
            let entries = self.inner.entries.lock();
            entries.values().filter_map(|entry| entry.process.clone()).collect()
        };
        for process in processes {
            if process.status().is_active() {
                if let Err(e) = process.stop(timeout).await {
                    warn!(id = %process.id(), error = %e, "stop during shutdown failed");
                }
            }
            process.dispose().await;
        }
        self.inner.cancel.cancel();
    }
}

/// Jittered exponential restart delay, capped per attempt.
fn restart_delay(base_ms: u64, attempt: u32) -> Duration {
    let base = Duration::from_millis(base_ms.max(1));
    let exp = base.as_secs_f64() * 1.5_f64.powi(attempt.min(16) as i32);
    let jitter = 0.75 + rand::random::<f64>() * 0.5;
    Duration::from_secs_f64((exp * jitter).min(MAX_RESTART_DELAY.as_secs_f64()))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
