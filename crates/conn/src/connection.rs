// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-process duplex link to the daemon.
//!
//! State machine: Idle → Connecting → Connected ↔ Reconnecting → Disposed.
//! A connection inside the daemon itself (`daemon_self`) goes straight to
//! Connected and never registers or reconnects.
//!
//! All periodic work (heartbeat, metrics, diagnostics) and the queue
//! reader run on spawned tasks under one cancellation tree; nothing a
//! timer does can surface an error to the caller.

use crate::config::ConnectionConfig;
use crate::diagnostics::{DiagnosticRequest, Diagnostics};
use crate::direct::DirectTransport;
use crate::events::ConnectionEvent;
use crate::queue::OutgoingQueue;
use crate::sampler::MetricsSampler;
use crate::ConnectionError;
use ghost_bus::Bus;
use ghost_core::channel::channels;
use ghost_core::{
    Clock, CommandResponse, ConnectionId, ConnectionStatistics, MessageEnvelope, Priority,
    ProcessId, ProcessRegistration, StatisticsSnapshot, SystemClock, SystemCommand, SystemEvent,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Link state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Disposed,
}

ghost_core::simple_display! {
    LinkState {
        Idle => "idle",
        Connecting => "connecting",
        Connected => "connected",
        Reconnecting => "reconnecting",
        Disposed => "disposed",
    }
}

pub struct GhostConnection {
    id: ConnectionId,
    process_id: ProcessId,
    registration: ProcessRegistration,
    bus: Bus,
    config: ConnectionConfig,
    fallback: Option<Arc<dyn DirectTransport>>,
    state: Mutex<LinkState>,
    using_fallback: AtomicBool,
    started: AtomicBool,
    disposed: AtomicBool,
    reconnecting: AtomicBool,
    reconnect_attempts: AtomicU32,
    queue: Arc<OutgoingQueue>,
    stats: Arc<ConnectionStatistics>,
    sampler: MetricsSampler,
    events: broadcast::Sender<ConnectionEvent>,
    /// Root cancellation: dispose tears down every task
    cancel: CancellationToken,
    /// Per-connected-session timers, restarted on every reconnect
    timers: Mutex<Option<CancellationToken>>,
    start_flight: tokio::sync::Mutex<()>,
}

impl GhostConnection {
    pub fn new(
        bus: Bus,
        registration: ProcessRegistration,
        config: ConnectionConfig,
        fallback: Option<Arc<dyn DirectTransport>>,
    ) -> Arc<Self> {
        let stats = Arc::new(ConnectionStatistics::default());
        let queue = Arc::new(OutgoingQueue::new(config.queue_capacity, Arc::clone(&stats)));
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            id: ConnectionId::new(),
            process_id: registration.id.clone(),
            registration,
            bus,
            config,
            fallback,
            state: Mutex::new(LinkState::Idle),
            using_fallback: AtomicBool::new(false),
            started: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            queue,
            stats,
            sampler: MetricsSampler::new(),
            events,
            cancel: CancellationToken::new(),
            timers: Mutex::new(None),
            start_flight: tokio::sync::Mutex::new(()),
        })
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn process_id(&self) -> &ProcessId {
        &self.process_id
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    pub fn using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Acquire)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    fn now_ms(&self) -> u64 {
        SystemClock.epoch_ms()
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn is_connected(&self) -> bool {
        self.config.daemon_self || *self.state.lock() == LinkState::Connected
    }

    /// Begin reporting to the daemon. Repeated calls after the first are
    /// no-ops; the call never blocks on an unreachable daemon longer than
    /// one connection check.
    pub async fn start_reporting(self: &Arc<Self>) -> Result<(), ConnectionError> {
        if self.is_disposed() {
            return Err(ConnectionError::Disposed);
        }
        let _flight = self.start_flight.lock().await;
        if self.started.load(Ordering::Acquire) {
            debug!(id = %self.id, "start_reporting already done");
            return Ok(());
        }

        self.spawn_queue_reader();

        if self.config.daemon_self {
            *self.state.lock() = LinkState::Connected;
            self.start_timers();
            self.started.store(true, Ordering::Release);
            info!(id = %self.id, "daemon-self connection online");
            return Ok(());
        }

        *self.state.lock() = LinkState::Connecting;
        if self.check_connection().await {
            // Connected before registering: the queue reader only drains
            // while the link is up, and registration rides the queue.
            *self.state.lock() = LinkState::Connected;
            self.reconnect_attempts.store(0, Ordering::Release);
            self.register().await;
            self.start_timers();
            self.emit(ConnectionEvent::StatusChanged {
                connected: true,
                using_fallback: self.using_fallback(),
            });
            info!(id = %self.id, process = %self.process_id, "connected to daemon");
        } else {
            *self.state.lock() = LinkState::Reconnecting;
            self.emit(ConnectionEvent::StatusChanged {
                connected: false,
                using_fallback: self.using_fallback(),
            });
            warn!(id = %self.id, "daemon unreachable, running in offline mode");
            self.schedule_reconnect();
        }

        self.started.store(true, Ordering::Release);
        Ok(())
    }

    /// Probe connectivity: bus ping first, then the fallback transport.
    /// Updates `using_fallback` to reflect which path answered.
    pub async fn check_connection(&self) -> bool {
        if self.bus.is_available().await && self.bus_ping().await {
            self.using_fallback.store(false, Ordering::Release);
            return true;
        }
        if self.config.enable_fallback {
            if let Some(transport) = &self.fallback {
                if transport.test_connection().await {
                    self.using_fallback.store(true, Ordering::Release);
                    return true;
                }
            }
        }
        false
    }

    /// One ping round-trip on the bus within the ping deadline.
    async fn bus_ping(&self) -> bool {
        let reply = channels::responses(&self.id, &uuid::Uuid::new_v4().to_string());
        let mut sub = match self.bus.subscribe::<CommandResponse>(&reply).await {
            Ok(sub) => sub,
            Err(e) => {
                debug!(error = %e, "ping subscribe failed");
                return false;
            }
        };

        let cmd = SystemCommand::new("ping", self.now_ms()).with_response_channel(reply);
        let cmd_id = cmd.command_id;
        let payload = match ghost_core::to_json(&cmd) {
            Ok(p) => p,
            Err(_) => return false,
        };
        if let Err(e) = self.bus.publish_bytes(channels::COMMANDS, payload, Priority::High).await
        {
            debug!(error = %e, "ping publish failed");
            return false;
        }

        let deadline = tokio::time::Instant::now() + self.config.ping_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match tokio::time::timeout(remaining, sub.recv()).await {
                Ok(Some(response)) if response.command_id == cmd_id && response.success => {
                    return true;
                }
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return false,
            }
        }
    }

    /// Send the registration snapshot and announce this process.
    async fn register(&self) {
        if self.config.daemon_self {
            return;
        }
        let payload = match ghost_core::to_payload(&self.registration) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "registration encode failed");
                return;
            }
        };

        let response = self
            .send_command_with("register", HashMap::new(), None, Some(payload.clone()))
            .await;
        if !response.success {
            warn!(
                id = %self.id,
                error = response.error.as_deref().unwrap_or("timeout"),
                "daemon registration not acknowledged"
            );
        }

        let now = self.now_ms();
        let registered = SystemEvent::ProcessRegistered {
            process_id: self.process_id.clone(),
            data: payload,
            timestamp_ms: now,
        };
        let started =
            SystemEvent::ProcessStarted { process_id: self.process_id.clone(), timestamp_ms: now };

        for (channel, event) in [
            (channels::EVENTS.to_string(), &registered),
            (channels::EVENTS.to_string(), &started),
            (channels::events_for(&self.process_id), &started),
        ] {
            if let Err(e) = self.bus.publish(&channel, event).await {
                warn!(channel = %channel, error = %e, "lifecycle event publish failed");
            }
        }
    }

    /// Send a command and wait for its reply. Never errors: a missed
    /// deadline yields a synthetic failure response.
    pub async fn send_command(
        &self,
        command_type: &str,
        parameters: HashMap<String, String>,
        target: Option<ProcessId>,
        payload: Option<Vec<u8>>,
    ) -> CommandResponse {
        self.send_command_with(command_type, parameters, target, payload).await
    }

    async fn send_command_with(
        &self,
        command_type: &str,
        parameters: HashMap<String, String>,
        target: Option<ProcessId>,
        payload: Option<Vec<u8>>,
    ) -> CommandResponse {
        let reply = channels::responses(&self.id, &uuid::Uuid::new_v4().to_string());
        let mut cmd = SystemCommand::new(command_type, self.now_ms()).with_response_channel(&reply);
        cmd.parameters.extend(parameters);
        cmd.target_process_id = target;
        cmd.payload = payload;
        let cmd_id = cmd.command_id;

        if self.using_fallback() {
            if let Some(transport) = &self.fallback {
                return match transport.send_command(&cmd).await {
                    Ok(response) => {
                        self.stats.record_received(self.now_ms());
                        response
                    }
                    Err(e) => CommandResponse::failure(cmd_id, e.to_string(), self.now_ms()),
                };
            }
        }

        let mut sub = match self.bus.subscribe::<CommandResponse>(&reply).await {
            Ok(sub) => sub,
            Err(e) => return CommandResponse::failure(cmd_id, e.to_string(), self.now_ms()),
        };

        let bytes = match ghost_core::to_json(&cmd) {
            Ok(b) => b,
            Err(e) => return CommandResponse::failure(cmd_id, e.to_string(), self.now_ms()),
        };
        self.queue.push(MessageEnvelope::new(
            channels::COMMANDS,
            bytes,
            "command",
            cmd.priority(),
            self.now_ms(),
        ));

        let deadline = tokio::time::Instant::now() + self.config.command_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return CommandResponse::timed_out(cmd_id, self.now_ms());
            }
            match tokio::time::timeout(remaining, sub.recv()).await {
                Ok(Some(response)) if response.command_id == cmd_id => {
                    self.stats.record_received(self.now_ms());
                    return response;
                }
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => {
                    return CommandResponse::timed_out(cmd_id, self.now_ms());
                }
            }
        }
    }

    /// Queue an event for delivery. Never blocks, never errors; bounded
    /// queueing applies.
    pub fn publish_event(&self, event: &SystemEvent, priority: Priority) {
        let Ok(bytes) = ghost_core::to_json(event) else {
            self.stats.record_error("event encode failed");
            return;
        };
        self.queue.push(MessageEnvelope::new(
            channels::EVENTS,
            bytes,
            event.type_name(),
            priority,
            self.now_ms(),
        ));
    }

    fn spawn_queue_reader(self: &Arc<Self>) {
        let conn = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let Some(envelope) = conn.queue.wait_pop(&cancel).await else { break };

                if !conn.is_connected() {
                    // Offline: requeue to the head and wait. Retry budgets
                    // are spent by these requeues, so Low/Normal messages
                    // age out while High/Critical outlive short outages.
                    if envelope.exhausted() {
                        conn.stats.record_dropped();
                        debug!(channel = %envelope.channel, "retry budget spent, dropping");
                    } else {
                        conn.stats.record_requeued();
                        conn.queue.push_front(envelope.requeued());
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(conn.config.offline_retry_delay) => {}
                    }
                    continue;
                }

                let channel = envelope.channel.clone();
                let payload = envelope.payload.clone();
                match conn.bus.publish_bytes(&channel, payload, envelope.priority).await {
                    Ok(()) => {
                        conn.stats.record_sent(conn.now_ms());
                    }
                    Err(e) => {
                        conn.stats.record_error(e.to_string());
                        conn.handle_send_failure(envelope).await;
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(conn.config.offline_retry_delay) => {}
                        }
                    }
                }
            }
            debug!("queue reader stopped");
        });
    }

    /// A send blew up mid-flight: flip to Reconnecting (once), keep the
    /// envelope only if it's High/Critical with budget left.
    async fn handle_send_failure(self: &Arc<Self>, envelope: MessageEnvelope) {
        if envelope.priority >= Priority::High && !envelope.exhausted() {
            self.stats.record_requeued();
            self.queue.push_front(envelope.requeued());
        } else {
            self.stats.record_dropped();
        }

        let flipped = {
            let mut state = self.state.lock();
            if *state == LinkState::Connected && !self.config.daemon_self {
                *state = LinkState::Reconnecting;
                true
            } else {
                false
            }
        };
        if flipped {
            self.stop_timers();
            self.emit(ConnectionEvent::StatusChanged {
                connected: false,
                using_fallback: self.using_fallback(),
            });
            warn!(id = %self.id, "send failed while connected, reconnecting");
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self.is_disposed() || self.config.daemon_self {
            return;
        }
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }

        let conn = Arc::clone(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                if conn.is_disposed() {
                    break;
                }
                let attempt = conn.reconnect_attempts.fetch_add(1, Ordering::AcqRel);
                conn.stats.record_reconnect_attempt();
                let jitter = conn.config.reconnect.sample_jitter();
                let delay = conn.config.reconnect.delay(attempt, jitter);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                if conn.is_disposed() {
                    break;
                }

                if conn.check_connection().await {
                    *conn.state.lock() = LinkState::Connected;
                    conn.reconnect_attempts.store(0, Ordering::Release);
                    conn.register().await;
                    conn.start_timers();
                    conn.emit(ConnectionEvent::StatusChanged {
                        connected: true,
                        using_fallback: conn.using_fallback(),
                    });
                    info!(id = %conn.id, "reconnected");
                    break;
                }

                if attempt + 1 == conn.config.reconnect.max_attempts
                    && conn.config.enable_diagnostics
                {
                    conn.run_diagnostics_once().await;
                }
            }
            conn.reconnecting.store(false, Ordering::Release);
        });
    }

    fn start_timers(self: &Arc<Self>) {
        let token = {
            let mut slot = self.timers.lock();
            if let Some(old) = slot.take() {
                old.cancel();
            }
            let token = self.cancel.child_token();
            *slot = Some(token.clone());
            token
        };

        // Heartbeat
        if self.config.auto_monitor {
            let conn = Arc::clone(self);
            let cancel = token.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(conn.config.heartbeat_interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tick.tick() => conn.enqueue_heartbeat(),
                    }
                }
            });
        }

        // Metrics
        if self.config.auto_monitor {
            let conn = Arc::clone(self);
            let cancel = token.clone();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(conn.config.metrics_interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tick.tick() => conn.enqueue_metrics(),
                    }
                }
            });
        }

        // Diagnostics
        if self.config.enable_diagnostics {
            let conn = Arc::clone(self);
            let cancel = token;
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(conn.config.diagnostics_interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // interval fires immediately; the first diagnostics pass
                // right after connecting would be noise
                tick.tick().await;
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tick.tick() => conn.run_diagnostics_once().await,
                    }
                }
            });
        }
    }

    fn stop_timers(&self) {
        if let Some(token) = self.timers.lock().take() {
            token.cancel();
        }
    }

    fn enqueue_heartbeat(&self) {
        let beat = ghost_core::HeartbeatMessage::running(
            self.process_id.clone(),
            self.registration.kind.to_string(),
            self.now_ms(),
        );
        match ghost_core::to_payload(&beat) {
            Ok(payload) => self.queue.push(MessageEnvelope::new(
                channels::health(&self.process_id),
                payload,
                "heartbeat",
                Priority::Normal,
                self.now_ms(),
            )),
            Err(e) => self.stats.record_error(e.to_string()),
        }
    }

    fn enqueue_metrics(&self) {
        let sample = self.sampler.sample(&self.process_id);
        match ghost_core::to_payload(&sample) {
            Ok(payload) => self.queue.push(MessageEnvelope::new(
                channels::metrics(&self.process_id),
                payload,
                "metrics",
                Priority::Low,
                self.now_ms(),
            )),
            Err(e) => self.stats.record_error(e.to_string()),
        }
    }

    fn build_diagnostics(&self) -> Diagnostics {
        let state_dir = self
            .config
            .state_dir
            .clone()
            .unwrap_or_else(ghost_core::config::resolve_state_dir);
        Diagnostics::new(
            self.bus.clone(),
            self.fallback.clone(),
            state_dir,
            self.config.auto_start_daemon,
        )
    }

    async fn run_diagnostics_once(&self) {
        let diag = self.build_diagnostics();
        let results = diag.run(DiagnosticRequest::default()).await;

        if !results.is_daemon_running && results.can_auto_start_daemon {
            diag.try_start_daemon();
        }
        if !results.is_broker_available && results.can_use_fallback {
            self.using_fallback.store(true, Ordering::Release);
        }
        self.emit(ConnectionEvent::DiagnosticsCompleted { results });
    }

    /// Tear down the connection. Idempotent; safe even when the state lock
    /// cannot be acquired within its five-second deadline.
    pub async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let was_connected = match self.state.try_lock_for(Duration::from_secs(5)) {
            Some(mut state) => {
                let was = *state == LinkState::Connected;
                *state = LinkState::Disposed;
                was
            }
            None => {
                warn!(id = %self.id, "state lock timed out during dispose, proceeding");
                false
            }
        };

        if was_connected && !self.config.daemon_self {
            // Direct publish: the queue is about to close.
            let event = SystemEvent::ProcessStopped {
                process_id: self.process_id.clone(),
                exit_code: None,
                timestamp_ms: self.now_ms(),
            };
            for channel in
                [channels::EVENTS.to_string(), channels::events_for(&self.process_id)]
            {
                if let Err(e) = self.bus.publish(&channel, &event).await {
                    debug!(channel = %channel, error = %e, "stop event publish failed");
                }
            }
        }

        self.stop_timers();
        self.queue.close();
        self.cancel.cancel();
        info!(id = %self.id, "connection disposed");
    }
}

impl Drop for GhostConnection {
    fn drop(&mut self) {
        self.queue.close();
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
