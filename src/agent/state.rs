//! Task lifecycle state.
//!
//! Pure, synchronous state machine for one automation task instance. The
//! controller in [`crate::agent::controller`] owns an instance of
//! [`TaskState`] and applies remote observations through the merge methods
//! here; everything in this module is deterministic and directly testable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::tasks::{RemoteTaskDetail, RemoteTaskStep};

/// Lifecycle phase of the local task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl TaskPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the polling loop should keep running in this phase.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Lifecycle command issued against a live task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }
}

/// Legality table for lifecycle commands. Returns the phase the command
/// leads to; illegal pairs are rejected before any upstream call is made.
pub fn validate_transition(
    phase: TaskPhase,
    command: ControlCommand,
) -> Result<TaskPhase, ValidationError> {
    match (phase, command) {
        (TaskPhase::Running, ControlCommand::Pause) => Ok(TaskPhase::Paused),
        (TaskPhase::Paused, ControlCommand::Resume) => Ok(TaskPhase::Running),
        (TaskPhase::Running | TaskPhase::Paused, ControlCommand::Stop) => Ok(TaskPhase::Idle),
        _ => Err(ValidationError::InvalidCommand {
            command: command.as_str().to_string(),
            phase: phase.as_str().to_string(),
        }),
    }
}

/// One observed automation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStep {
    pub action: String,
    pub detail: Option<String>,
    pub url: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub screenshot: Option<String>,
}

impl TaskStep {
    /// Derive display fields from a provider step. `ordinal` is zero-based.
    fn from_remote(remote: &RemoteTaskStep, ordinal: usize) -> Self {
        Self {
            action: non_empty(&remote.next_goal).unwrap_or_else(|| format!("Step {}", ordinal + 1)),
            detail: non_empty(&remote.evaluation_previous_goal),
            url: non_empty(&remote.url),
            recorded_at: Utc::now(),
            screenshot: None,
        }
    }
}

/// Serializable view of [`TaskState`]. Nulls are emitted rather than
/// omitted: dashboard clients key off field presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub task_id: Option<String>,
    pub status: TaskPhase,
    pub progress: u8,
    pub steps: Vec<TaskStep>,
    pub output: Option<String>,
    pub live_url: Option<String>,
    pub error: Option<String>,
}

/// Mutable state of the current task instance.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub task_id: Option<String>,
    pub phase: TaskPhase,
    pub progress: u8,
    pub steps: Vec<TaskStep>,
    pub output: Option<String>,
    pub live_url: Option<String>,
    pub error: Option<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            task_id: None,
            phase: TaskPhase::Idle,
            progress: 0,
            steps: Vec::new(),
            output: None,
            live_url: None,
            error: None,
        }
    }
}

impl TaskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.task_id.clone(),
            status: self.phase,
            progress: self.progress,
            steps: self.steps.clone(),
            output: self.output.clone(),
            live_url: self.live_url.clone(),
            error: self.error.clone(),
        }
    }

    /// Normalize a provider status string into the local phase.
    ///
    /// `stopped` means the remote side killed the task outside our control,
    /// which this instance records as a failure; a clean local stop clears
    /// the task before any further polling. Unrecognized statuses (`created`,
    /// `pending`, or anything the provider adds later) leave the phase
    /// untouched and polling continues.
    pub fn apply_remote_status(&mut self, raw: &str) {
        match raw {
            "finished" | "completed" => {
                self.phase = TaskPhase::Completed;
                self.progress = 100;
            }
            "failed" => {
                self.phase = TaskPhase::Failed;
                if self.error.is_none() {
                    self.error = Some("Task failed".to_string());
                }
            }
            "stopped" => {
                self.phase = TaskPhase::Failed;
                if self.error.is_none() {
                    self.error = Some("Task was stopped remotely".to_string());
                }
            }
            "paused" => self.phase = TaskPhase::Paused,
            "running" => self.phase = TaskPhase::Running,
            _ => {}
        }
    }

    /// Merge a remote detail under the per-field adoption rules:
    /// `live_url` and `output` are adopted only while locally unset, steps
    /// are appended by ordinal and never removed or reordered, and progress
    /// is recomputed from the step count afterwards.
    pub fn merge_detail(&mut self, detail: &RemoteTaskDetail) {
        if self.live_url.is_none() {
            self.live_url = non_empty(&detail.live_url);
        }
        if self.output.is_none() {
            self.output = non_empty(&detail.output);
        }
        for (ordinal, remote) in detail.steps.iter().enumerate().skip(self.steps.len()) {
            self.steps.push(TaskStep::from_remote(remote, ordinal));
        }
        self.progress = compute_progress(self.steps.len(), self.phase);
    }

    /// Correlate screenshots with steps by position: `refs[i]` belongs to
    /// step `i`. A step keeps its first screenshot; refs beyond the step
    /// list are dropped; steps beyond the ref list stay bare.
    pub fn attach_screenshots(&mut self, refs: &[String]) {
        for (step, shot) in self.steps.iter_mut().zip(refs) {
            if step.screenshot.is_none() && !shot.is_empty() {
                step.screenshot = Some(shot.clone());
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Display progress: 5% per observed step, capped at 99 until the task
/// completes, then exactly 100.
pub(crate) fn compute_progress(step_count: usize, phase: TaskPhase) -> u8 {
    if phase == TaskPhase::Completed {
        return 100;
    }
    step_count.saturating_mul(5).min(99) as u8
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn remote_step(goal: &str) -> RemoteTaskStep {
        RemoteTaskStep {
            id: None,
            step: None,
            evaluation_previous_goal: None,
            next_goal: Some(goal.to_string()),
            url: None,
            extra: serde_json::Map::new(),
        }
    }

    fn detail_with_steps(goals: &[&str]) -> RemoteTaskDetail {
        RemoteTaskDetail {
            id: "task-1".to_string(),
            status: Some("running".to_string()),
            steps: goals.iter().map(|g| remote_step(g)).collect(),
            output: None,
            live_url: None,
            extra: serde_json::Map::new(),
        }
    }

    fn running_state() -> TaskState {
        let mut state = TaskState::new();
        state.task_id = Some("task-1".to_string());
        state.phase = TaskPhase::Running;
        state
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use ControlCommand::*;
        use TaskPhase::*;

        assert_eq!(validate_transition(Running, Pause).ok(), Some(Paused));
        assert_eq!(validate_transition(Paused, Resume).ok(), Some(Running));
        assert_eq!(validate_transition(Running, Stop).ok(), Some(Idle));
        assert_eq!(validate_transition(Paused, Stop).ok(), Some(Idle));

        for phase in [Idle, Paused, Completed, Failed] {
            assert!(validate_transition(phase, Pause).is_err());
        }
        for phase in [Idle, Running, Completed, Failed] {
            assert!(validate_transition(phase, Resume).is_err());
        }
        for phase in [Idle, Completed, Failed] {
            assert!(validate_transition(phase, Stop).is_err());
        }
    }

    #[test]
    fn polling_predicate_covers_running_and_paused_only() {
        assert!(TaskPhase::Running.is_active());
        assert!(TaskPhase::Paused.is_active());
        assert!(!TaskPhase::Idle.is_active());
        assert!(!TaskPhase::Completed.is_active());
        assert!(!TaskPhase::Failed.is_active());
    }

    #[test]
    fn finished_status_completes_and_snaps_progress() {
        let mut state = running_state();
        state.progress = 45;
        state.apply_remote_status("finished");

        assert_eq!(state.phase, TaskPhase::Completed);
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn failed_status_keeps_progress_and_records_error() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a", "b", "c"]));
        state.apply_remote_status("failed");

        assert_eq!(state.phase, TaskPhase::Failed);
        assert_eq!(state.progress, 15);
        assert_eq!(state.error.as_deref(), Some("Task failed"));
    }

    #[test]
    fn failed_status_does_not_clobber_existing_error() {
        let mut state = running_state();
        state.error = Some("Failed to update task status".to_string());
        state.apply_remote_status("failed");

        assert_eq!(state.error.as_deref(), Some("Failed to update task status"));
    }

    #[test]
    fn remote_stop_is_recorded_as_failure() {
        let mut state = running_state();
        state.apply_remote_status("stopped");

        assert_eq!(state.phase, TaskPhase::Failed);
        assert_eq!(state.error.as_deref(), Some("Task was stopped remotely"));
    }

    #[test]
    fn unknown_status_keeps_current_phase() {
        let mut state = running_state();
        state.apply_remote_status("created");
        assert_eq!(state.phase, TaskPhase::Running);

        state.phase = TaskPhase::Paused;
        state.apply_remote_status("warming-up");
        assert_eq!(state.phase, TaskPhase::Paused);
    }

    #[test]
    fn progress_formula_boundaries() {
        assert_eq!(compute_progress(0, TaskPhase::Running), 0);
        assert_eq!(compute_progress(3, TaskPhase::Running), 15);
        assert_eq!(compute_progress(19, TaskPhase::Running), 95);
        assert_eq!(compute_progress(20, TaskPhase::Running), 99);
        assert_eq!(compute_progress(40, TaskPhase::Running), 99);
        assert_eq!(compute_progress(0, TaskPhase::Completed), 100);
    }

    #[test]
    fn steps_are_append_only() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["open wallet", "find accounts"]));
        assert_eq!(state.steps.len(), 2);
        assert_eq!(state.progress, 10);

        state.merge_detail(&detail_with_steps(&[
            "open wallet",
            "find accounts",
            "close account",
        ]));
        assert_eq!(state.steps.len(), 3);
        assert_eq!(state.steps[2].action, "close account");
        assert_eq!(state.progress, 15);
    }

    #[test]
    fn identical_merge_is_idempotent() {
        let mut state = running_state();
        let detail = detail_with_steps(&["a", "b", "c"]);
        state.merge_detail(&detail);
        let first = state.snapshot();
        state.merge_detail(&detail);

        assert_eq!(state.snapshot(), first);
    }

    #[test]
    fn shrinking_remote_list_never_truncates() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a", "b", "c"]));
        state.merge_detail(&detail_with_steps(&["a"]));

        assert_eq!(state.steps.len(), 3);
        assert_eq!(state.progress, 15);
    }

    #[test]
    fn adopts_live_url_once() {
        let mut state = running_state();
        let mut detail = detail_with_steps(&[]);
        detail.live_url = Some("https://live.example/one".to_string());
        state.merge_detail(&detail);
        assert_eq!(state.live_url.as_deref(), Some("https://live.example/one"));

        detail.live_url = Some("https://live.example/two".to_string());
        state.merge_detail(&detail);
        assert_eq!(state.live_url.as_deref(), Some("https://live.example/one"));
    }

    #[test]
    fn blank_live_url_is_not_adopted() {
        let mut state = running_state();
        let mut detail = detail_with_steps(&[]);
        detail.live_url = Some("  ".to_string());
        state.merge_detail(&detail);

        assert!(state.live_url.is_none());
    }

    #[test]
    fn adopts_output_once() {
        let mut state = running_state();
        let mut detail = detail_with_steps(&[]);
        detail.output = Some("closed 3 accounts".to_string());
        state.merge_detail(&detail);

        detail.output = Some("revised output".to_string());
        state.merge_detail(&detail);

        assert_eq!(state.output.as_deref(), Some("closed 3 accounts"));
    }

    #[test]
    fn screenshots_attach_positionally() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a", "b", "c"]));
        state.attach_screenshots(&[
            "shot-0".to_string(),
            "shot-1".to_string(),
        ]);

        assert_eq!(state.steps[0].screenshot.as_deref(), Some("shot-0"));
        assert_eq!(state.steps[1].screenshot.as_deref(), Some("shot-1"));
        assert_eq!(state.steps[2].screenshot, None);
    }

    #[test]
    fn excess_screenshots_are_dropped() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a"]));
        state.attach_screenshots(&[
            "shot-0".to_string(),
            "shot-1".to_string(),
            "shot-2".to_string(),
        ]);

        assert_eq!(state.steps.len(), 1);
        assert_eq!(state.steps[0].screenshot.as_deref(), Some("shot-0"));
    }

    #[test]
    fn first_screenshot_wins() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a"]));
        state.attach_screenshots(&["original".to_string()]);
        state.attach_screenshots(&["replacement".to_string()]);

        assert_eq!(state.steps[0].screenshot.as_deref(), Some("original"));
    }

    #[test]
    fn empty_screenshot_slot_leaves_step_bare() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a", "b"]));
        state.attach_screenshots(&[String::new(), "shot-1".to_string()]);

        assert_eq!(state.steps[0].screenshot, None);
        assert_eq!(state.steps[1].screenshot.as_deref(), Some("shot-1"));

        // The slot can still be filled by a later fetch.
        state.attach_screenshots(&["late-0".to_string()]);
        assert_eq!(state.steps[0].screenshot.as_deref(), Some("late-0"));
    }

    #[test]
    fn step_display_falls_back_to_ordinal() {
        let mut state = running_state();
        let mut detail = detail_with_steps(&[""]);
        detail.steps[0].next_goal = None;
        detail.steps[0].evaluation_previous_goal = Some("landed on homepage".to_string());
        detail.steps[0].url = Some("https://solscan.io".to_string());
        state.merge_detail(&detail);

        assert_eq!(state.steps[0].action, "Step 1");
        assert_eq!(state.steps[0].detail.as_deref(), Some("landed on homepage"));
        assert_eq!(state.steps[0].url.as_deref(), Some("https://solscan.io"));
    }

    #[test]
    fn reset_restores_idle_defaults() {
        let mut state = running_state();
        state.merge_detail(&detail_with_steps(&["a"]));
        state.output = Some("done".to_string());
        state.error = Some("Failed to update task status".to_string());
        state.reset();

        assert_eq!(state.phase, TaskPhase::Idle);
        assert!(state.task_id.is_none());
        assert!(state.steps.is_empty());
        assert_eq!(state.progress, 0);
        assert!(state.output.is_none());
        assert!(state.live_url.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn snapshot_serializes_camel_case_with_nulls() {
        let state = running_state();
        let value = serde_json::to_value(state.snapshot()).expect("snapshot serializes");

        assert_eq!(value["taskId"], "task-1");
        assert_eq!(value["status"], "running");
        assert!(value.as_object().expect("object").contains_key("liveUrl"));
        assert_eq!(value["liveUrl"], serde_json::Value::Null);
        assert_eq!(value["error"], serde_json::Value::Null);
    }
}
