//! Task lifecycle controller.
//!
//! Owns the [`TaskState`] for the current task instance, serializes lifecycle
//! commands, and runs the polling loop that merges remote progress into the
//! snapshot. Each start/stop/reset bumps a generation counter; a poll tick
//! re-checks the generation under the write lock before applying, so results
//! computed for a replaced or stopped instance are discarded instead of
//! merged.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;

use crate::agent::state::{ControlCommand, TaskPhase, TaskSnapshot, TaskState, validate_transition};
use crate::error::{DisconnectSignal, GatewayError, Result, ValidationError, redact_sensitive_detail};
use crate::tasks::{TaskGateway, TaskRequest};

/// Error recorded on the snapshot when a poll tick cannot reach the provider.
pub const POLL_FAILURE_MESSAGE: &str = "Failed to update task status";

/// Remote statuses that warrant a detail fetch on the same tick.
const DETAIL_STATUSES: &[&str] = &["running", "finished", "paused"];

pub struct TaskController {
    gateway: Arc<dyn TaskGateway>,
    poll_interval: Duration,
    state: RwLock<TaskState>,
    /// Identifies the live task instance; bumped by start, stop, and reset.
    generation: AtomicU64,
    /// Serializes lifecycle commands so their effects never interleave.
    commands: Mutex<()>,
}

impl TaskController {
    pub fn new(gateway: Arc<dyn TaskGateway>, poll_interval: Duration) -> Self {
        Self {
            gateway,
            poll_interval,
            state: RwLock::new(TaskState::new()),
            generation: AtomicU64::new(0),
            commands: Mutex::new(()),
        }
    }

    /// Current view of the task instance.
    pub async fn snapshot(&self) -> TaskSnapshot {
        self.state.read().await.snapshot()
    }

    /// Submit a new task and begin polling it.
    ///
    /// A blank description is rejected before anything else happens, leaving
    /// the existing snapshot untouched. Otherwise any live instance is
    /// replaced: the generation bump cancels its loop and invalidates its
    /// in-flight results.
    pub async fn start(self: &Arc<Self>, request: TaskRequest) -> Result<TaskSnapshot> {
        if request.task.trim().is_empty() {
            return Err(ValidationError::MissingTaskDescription.into());
        }

        let _guard = self.commands.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.reset();
        }

        match self.gateway.create(&request).await {
            Ok(detail) => {
                {
                    let mut state = self.state.write().await;
                    state.task_id = Some(detail.id.clone());
                    state.phase = TaskPhase::Running;
                }
                tracing::info!(task_id = %detail.id, "task started");
                self.spawn_poll_loop(generation);
                self.poll_once(generation).await;
                Ok(self.snapshot().await)
            }
            Err(err) => {
                tracing::warn!(
                    error = %redact_sensitive_detail(&err.to_string()),
                    "task submission failed"
                );
                let message = start_failure_message(&err);
                let mut state = self.state.write().await;
                state.phase = TaskPhase::Failed;
                state.error = Some(message);
                Err(err.into())
            }
        }
    }

    /// Pause the running task.
    pub async fn pause(&self) -> Result<TaskSnapshot> {
        let _guard = self.commands.lock().await;
        let task_id = self.command_target(ControlCommand::Pause).await?;

        match self.gateway.pause(&task_id).await {
            Ok(_) => {
                let mut state = self.state.write().await;
                state.phase = TaskPhase::Paused;
                Ok(state.snapshot())
            }
            Err(err) => {
                self.record_command_failure("Failed to pause task", &err).await;
                Err(err.into())
            }
        }
    }

    /// Resume the paused task.
    pub async fn resume(&self) -> Result<TaskSnapshot> {
        let _guard = self.commands.lock().await;
        let task_id = self.command_target(ControlCommand::Resume).await?;

        match self.gateway.resume(&task_id).await {
            Ok(_) => {
                let mut state = self.state.write().await;
                state.phase = TaskPhase::Running;
                Ok(state.snapshot())
            }
            Err(err) => {
                self.record_command_failure("Failed to resume task", &err).await;
                Err(err.into())
            }
        }
    }

    /// Stop the task and return to idle. Steps, output, and progress survive
    /// for the dashboard; the remote id and live view do not.
    pub async fn stop(&self) -> Result<TaskSnapshot> {
        let _guard = self.commands.lock().await;
        let task_id = self.command_target(ControlCommand::Stop).await?;

        match self.gateway.stop(&task_id).await {
            Ok(_) => {
                let mut state = self.state.write().await;
                self.generation.fetch_add(1, Ordering::SeqCst);
                state.phase = TaskPhase::Idle;
                state.task_id = None;
                state.live_url = None;
                tracing::info!(task_id = %task_id, "task stopped");
                Ok(state.snapshot())
            }
            Err(err) => {
                self.record_command_failure("Failed to stop task", &err).await;
                Err(err.into())
            }
        }
    }

    /// Discard the current instance entirely and return to the idle default.
    pub async fn reset(&self) -> TaskSnapshot {
        let _guard = self.commands.lock().await;
        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        state.reset();
        state.snapshot()
    }

    /// Reconcile a live-view disconnect: record the signal and drop the dead
    /// view URL, but leave the phase alone. The remote task may still be
    /// running, so polling continues and a fresh view URL can be adopted on
    /// a later tick.
    pub async fn notify_disconnect(&self) -> TaskSnapshot {
        let mut state = self.state.write().await;
        state.error = Some(DisconnectSignal.to_string());
        state.live_url = None;
        state.snapshot()
    }

    /// Run one poll tick out of cadence.
    pub async fn refresh_now(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        self.poll_once(generation).await;
    }

    /// Validate a lifecycle command against the current phase and return the
    /// remote id to address. Illegal commands error here, before any
    /// upstream call is issued.
    async fn command_target(&self, command: ControlCommand) -> Result<String> {
        let state = self.state.read().await;
        validate_transition(state.phase, command)?;
        state
            .task_id
            .clone()
            .ok_or_else(|| ValidationError::NoActiveTask.into())
    }

    async fn record_command_failure(&self, message: &str, err: &GatewayError) {
        tracing::warn!(
            error = %redact_sensitive_detail(&err.to_string()),
            "task command failed"
        );
        let mut state = self.state.write().await;
        state.error = Some(message.to_string());
    }

    fn spawn_poll_loop(self: &Arc<Self>, generation: u64) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(controller.poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; start()
            // already ran an immediate refresh, so consume it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if controller.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
                {
                    let state = controller.state.read().await;
                    if !state.phase.is_active() {
                        break;
                    }
                }
                controller.poll_once(generation).await;
            }
        });
    }

    /// One tick of the polling protocol: status, then detail while the
    /// status warrants it, then screenshots once steps exist, all applied
    /// atomically under the write lock.
    async fn poll_once(&self, generation: u64) {
        let task_id = {
            let state = self.state.read().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            match &state.task_id {
                Some(id) => id.clone(),
                None => return,
            }
        };

        let raw_status = match self.gateway.fetch_status(&task_id).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(
                    error = %redact_sensitive_detail(&err.to_string()),
                    "task status poll failed"
                );
                let mut state = self.state.write().await;
                if self.generation.load(Ordering::SeqCst) == generation {
                    state.error = Some(POLL_FAILURE_MESSAGE.to_string());
                }
                return;
            }
        };

        let mut poll_error = None;
        let detail = if DETAIL_STATUSES.contains(&raw_status.as_str()) {
            match self.gateway.fetch(&task_id).await {
                Ok(detail) => Some(detail),
                Err(err) => {
                    tracing::warn!(
                        error = %redact_sensitive_detail(&err.to_string()),
                        "task detail poll failed"
                    );
                    poll_error = Some(POLL_FAILURE_MESSAGE.to_string());
                    None
                }
            }
        } else {
            None
        };

        let screenshots = match &detail {
            Some(detail) if !detail.steps.is_empty() => {
                match self.gateway.fetch_screenshots(&task_id).await {
                    Ok(shots) => Some(shots),
                    Err(err) => {
                        tracing::debug!(error = %err, "screenshot fetch failed");
                        None
                    }
                }
            }
            _ => None,
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        state.apply_remote_status(&raw_status);
        if let Some(detail) = &detail {
            state.merge_detail(detail);
        }
        if let Some(shots) = &screenshots {
            state.attach_screenshots(shots);
        }
        if let Some(message) = poll_error {
            state.error = Some(message);
        }
    }
}

/// Start failures surface the provider's own `error` message when its body
/// carries one, matching what dashboard clients show.
fn start_failure_message(err: &GatewayError) -> String {
    if let GatewayError::Upstream { detail, .. } = err {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(detail) {
            if let Some(message) = value.get("error").and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    "Failed to start task".to_string()
}
