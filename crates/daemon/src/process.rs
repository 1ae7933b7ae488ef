// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A supervised external process.
//!
//! Lifecycle: Stopped → Starting → Running → Stopping → Stopped, with
//! Crashed and Failed as alternative exits. Transitions are validated
//! against [`ProcessStatus::can_transition`] and broadcast as
//! [`StatusChanged`]. The OS exit handler and stop/start/restart are
//! serialized on one lifecycle lock; the child runs in its own process
//! group so kill escalation takes the whole tree.

use crate::buffer::RingBuffer;
use ghost_core::{Clock, ProcessId, ProcessState, ProcessStatus, ProcessType, RestartPolicy, SystemClock};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Pause between stop and start during a restart.
const RESTART_PAUSE: Duration = Duration::from_millis(100);
/// Grace period after a forceful kill.
const KILL_GRACE: Duration = Duration::from_secs(1);
/// Lock deadline for dispose.
const DISPOSE_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to spawn one supervised process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub id: ProcessId,
    pub name: String,
    pub kind: ProcessType,
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    /// Output ring capacity, in lines
    pub max_buffer_size: usize,
    pub restart_policy: RestartPolicy,
}

impl ProcessSpec {
    pub fn new(id: ProcessId, name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: ProcessType::App,
            executable: executable.into(),
            arguments: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            max_buffer_size: 1_000,
            restart_policy: RestartPolicy::default(),
        }
    }
}

/// One observed lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub id: ProcessId,
    pub from: ProcessStatus,
    pub to: ProcessStatus,
    pub at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One captured output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub id: ProcessId,
    pub stream: OutputStream,
    pub line: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process start failed: {0}")]
    StartFailed(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("illegal transition {from} -> {to}")]
    IllegalTransition { from: ProcessStatus, to: ProcessStatus },
}

impl From<ProcessError> for ghost_core::GhostError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::StartFailed(msg) => ghost_core::GhostError::ProcessStartFailed(msg),
            ProcessError::InvalidOperation(msg) => {
                ghost_core::GhostError::InvalidOperation(msg)
            }
            ProcessError::IllegalTransition { .. } => {
                ghost_core::GhostError::Process(err.to_string())
            }
        }
    }
}

pub struct SupervisedProcess {
    spec: ProcessSpec,
    status: Mutex<ProcessStatus>,
    /// Serializes start/stop/restart and the exit handler
    lifecycle: AsyncMutex<()>,
    stdout: Mutex<RingBuffer>,
    stderr: Mutex<RingBuffer>,
    status_tx: broadcast::Sender<StatusChanged>,
    output_tx: broadcast::Sender<OutputLine>,
    pid: AtomicI32,
    /// Bumped per spawn so stale exit watchers know to stand down
    generation: AtomicU64,
    restart_count: AtomicU32,
    start_time_ms: Mutex<Option<u64>>,
    stop_time_ms: Mutex<Option<u64>>,
    last_error: Mutex<Option<String>>,
    disposed: AtomicBool,
    clock: SystemClock,
}

impl SupervisedProcess {
    pub fn new(spec: ProcessSpec) -> Arc<Self> {
        let buffer = spec.max_buffer_size;
        let (status_tx, _) = broadcast::channel(256);
        let (output_tx, _) = broadcast::channel(1024);
        Arc::new(Self {
            spec,
            status: Mutex::new(ProcessStatus::Stopped),
            lifecycle: AsyncMutex::new(()),
            stdout: Mutex::new(RingBuffer::new(buffer)),
            stderr: Mutex::new(RingBuffer::new(buffer)),
            status_tx,
            output_tx,
            pid: AtomicI32::new(0),
            generation: AtomicU64::new(0),
            restart_count: AtomicU32::new(0),
            start_time_ms: Mutex::new(None),
            stop_time_ms: Mutex::new(None),
            last_error: Mutex::new(None),
            disposed: AtomicBool::new(false),
            clock: SystemClock,
        })
    }

    pub fn id(&self) -> &ProcessId {
        &self.spec.id
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.lock()
    }

    pub fn restart_count(&self) -> u32 {
        self.restart_count.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        *self.start_time_ms.lock()
    }

    pub fn stop_time_ms(&self) -> Option<u64> {
        *self.stop_time_ms.lock()
    }

    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lock().snapshot()
    }

    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lock().snapshot()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusChanged> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_output(&self) -> broadcast::Receiver<OutputLine> {
        self.output_tx.subscribe()
    }

    /// Externally visible snapshot.
    pub fn state(&self) -> ProcessState {
        let status = self.status();
        ProcessState {
            id: self.spec.id.clone(),
            name: self.spec.name.clone(),
            is_running: status == ProcessStatus::Running,
            is_service: self.spec.kind.is_service(),
            start_time_ms: self.start_time_ms(),
            end_time_ms: self.stop_time_ms(),
            last_metrics: None,
            last_seen_ms: None,
        }
    }

    /// Validated transition; broadcasts on success.
    fn transition(&self, to: ProcessStatus) -> Result<(), ProcessError> {
        let (from, at_ms) = {
            let mut status = self.status.lock();
            let from = *status;
            if !from.can_transition(to) {
                return Err(ProcessError::IllegalTransition { from, to });
            }
            *status = to;
            (from, self.clock.epoch_ms())
        };
        debug!(id = %self.spec.id, %from, %to, "status change");
        let _ = self.status_tx.send(StatusChanged { id: self.spec.id.clone(), from, to, at_ms });
        Ok(())
    }

    /// Spawn the OS process. A second start while active is a no-op with a
    /// warning; a spawn failure transitions to Failed and surfaces.
    pub async fn start(self: &Arc<Self>) -> Result<(), ProcessError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ProcessError::InvalidOperation("process is disposed".into()));
        }
        let _guard = self.lifecycle.lock().await;

        if self.status().is_active() {
            warn!(id = %self.spec.id, "start ignored, process already active");
            return Ok(());
        }
        self.transition(ProcessStatus::Starting)?;

        let mut command = tokio::process::Command::new(&self.spec.executable);
        command
            .args(&self.spec.arguments)
            .envs(&self.spec.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.spec.working_directory {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                *self.last_error.lock() = Some(e.to_string());
                let _ = self.transition(ProcessStatus::Failed);
                return Err(ProcessError::StartFailed(format!(
                    "{}: {}",
                    self.spec.executable.display(),
                    e
                )));
            }
        };

        let pid = child.id().map(|p| p as i32).unwrap_or(0);
        self.pid.store(pid, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        if let Some(stdout) = child.stdout.take() {
            self.spawn_capture(stdout, OutputStream::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_capture(stderr, OutputStream::Stderr);
        }

        *self.start_time_ms.lock() = Some(self.clock.epoch_ms());
        *self.stop_time_ms.lock() = None;
        self.transition(ProcessStatus::Running)?;
        info!(id = %self.spec.id, pid, executable = %self.spec.executable.display(), "process started");

        self.spawn_exit_watcher(child, generation);
        Ok(())
    }

    fn spawn_capture(
        self: &Arc<Self>,
        stream: impl tokio::io::AsyncRead + Unpin + Send + 'static,
        kind: OutputStream,
    ) {
        let process = Arc::clone(self);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match kind {
                    OutputStream::Stdout => process.stdout.lock().push(line.clone()),
                    OutputStream::Stderr => process.stderr.lock().push(line.clone()),
                }
                let _ = process.output_tx.send(OutputLine {
                    id: process.spec.id.clone(),
                    stream: kind,
                    line,
                });
            }
        });
    }

    /// Wait for the child and apply the exit transition, serialized with
    /// stop through the lifecycle lock.
    fn spawn_exit_watcher(self: &Arc<Self>, mut child: tokio::process::Child, generation: u64) {
        let process = Arc::clone(self);
        tokio::spawn(async move {
            let exit = child.wait().await;
            let _guard = process.lifecycle.lock().await;

            // A restart already replaced this child.
            if process.generation.load(Ordering::Acquire) != generation {
                return;
            }

            let code = exit.as_ref().ok().and_then(|status| status.code());
            let now = process.clock.epoch_ms();
            let status = process.status();
            match (status, code) {
                // Exit observed while stopping: the stop path owns the
                // Stopping → Stopped transition and its bookkeeping.
                (ProcessStatus::Stopping, _) => {}
                (ProcessStatus::Running, Some(0)) => {
                    *process.stop_time_ms.lock() = Some(now);
                    let _ = process.transition(ProcessStatus::Stopped);
                    info!(id = %process.spec.id, "process exited cleanly");
                }
                (ProcessStatus::Running, code) => {
                    let message = match code {
                        Some(c) => format!("process exited with code {}", c),
                        None => "process terminated by signal".to_string(),
                    };
                    *process.last_error.lock() = Some(message.clone());
                    *process.stop_time_ms.lock() = Some(now);
                    let _ = process.transition(ProcessStatus::Crashed);
                    warn!(id = %process.spec.id, error = %message, "process crashed");
                }
                _ => {}
            }
        });
    }

    /// Graceful stop with kill escalation. No-op when already stopped or
    /// stopping.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ProcessError> {
        {
            let _guard = self.lifecycle.lock().await;
            match self.status() {
                ProcessStatus::Stopped
                | ProcessStatus::Stopping
                | ProcessStatus::Crashed
                | ProcessStatus::Failed => return Ok(()),
                ProcessStatus::Starting | ProcessStatus::Running => {}
            }
            self.transition(ProcessStatus::Stopping)?;
            self.signal_group(TermSignal::Graceful);
        }

        // Lock released: the exit watcher needs it to observe the exit.
        if !self.wait_gone(timeout).await {
            warn!(id = %self.spec.id, "graceful stop timed out, killing process tree");
            self.signal_group(TermSignal::Kill);
            self.wait_gone(KILL_GRACE).await;
        }

        let _guard = self.lifecycle.lock().await;
        let now = self.clock.epoch_ms();
        match self.status() {
            ProcessStatus::Stopping => {
                *self.stop_time_ms.lock() = Some(now);
                // Kill escalation failed to take the process down.
                if self.process_alive() {
                    *self.last_error.lock() = Some("process survived kill".to_string());
                    self.transition(ProcessStatus::Failed)?;
                } else {
                    self.transition(ProcessStatus::Stopped)?;
                }
            }
            // Exit watcher already settled the state.
            _ => {}
        }
        info!(id = %self.spec.id, status = %self.status(), "process stopped");
        Ok(())
    }

    /// Stop, pause briefly, start again; counts the restart.
    pub async fn restart(self: &Arc<Self>, timeout: Duration) -> Result<(), ProcessError> {
        self.stop(timeout).await?;
        tokio::time::sleep(RESTART_PAUSE).await;
        self.start().await?;
        self.restart_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Count a restart performed by a caller that drove stop/start itself
    /// (the manager's crash-restart path). Returns the new count.
    pub fn note_restart(&self) -> u32 {
        self.restart_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Reset the restart counter; a long stable run forgives earlier
    /// crashes.
    pub fn reset_restart_count(&self, to: u32) {
        self.restart_count.store(to, Ordering::Release);
    }

    /// Await process exit. Returns the terminal status; resolves
    /// immediately when the process is already terminal.
    pub async fn wait_for_exit(&self) -> ProcessStatus {
        loop {
            let status = self.status();
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll until the status settles terminal or the OS process is gone,
    /// or the deadline passes.
    async fn wait_gone(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.status().is_terminal() || !self.process_alive() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    fn process_alive(&self) -> bool {
        let pid = self.pid.load(Ordering::Acquire);
        if pid <= 0 {
            return false;
        }
        #[cfg(unix)]
        {
            nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn signal_group(&self, signal: TermSignal) {
        let pid = self.pid.load(Ordering::Acquire);
        if pid <= 0 {
            return;
        }
        #[cfg(unix)]
        {
            let sig = match signal {
                TermSignal::Graceful => nix::sys::signal::Signal::SIGTERM,
                TermSignal::Kill => nix::sys::signal::Signal::SIGKILL,
            };
            // The child leads its own process group, so this takes the tree.
            if let Err(e) = nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid), sig) {
                debug!(id = %self.spec.id, pid, signal = ?sig, error = %e, "signal delivery failed");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = signal;
        }
    }

    /// Idempotent teardown: kills the tree if still running, clears
    /// buffers. Proceeds without the lifecycle lock after a five-second
    /// wait.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let guard = tokio::time::timeout(DISPOSE_LOCK_TIMEOUT, self.lifecycle.lock()).await;
        if guard.is_err() {
            warn!(id = %self.spec.id, "lifecycle lock timed out during dispose, proceeding");
        }

        if self.status().is_active() {
            self.signal_group(TermSignal::Kill);
            let now = self.clock.epoch_ms();
            *self.stop_time_ms.lock() = Some(now);
            *self.status.lock() = ProcessStatus::Stopped;
        }
        self.stdout.lock().clear();
        self.stderr.lock().clear();
        info!(id = %self.spec.id, "process disposed");
    }
}

#[derive(Debug, Clone, Copy)]
enum TermSignal {
    Graceful,
    Kill,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
