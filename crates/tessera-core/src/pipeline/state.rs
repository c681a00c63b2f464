//! Job state machine and the status channel observers watch.
//!
//! A job moves `Idle → Preparing → Extracting(i) → Awaiting(i) → … →
//! Compositing → Done`, or to `Failed` from any non-terminal state. Each
//! transition is published on a [`tokio::sync::watch`] channel together with
//! the `(completed, total)` tile counter, so a front end can poll or await the
//! latest status without the pipeline knowing anything about it.

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Where a job currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Preparing,
    Extracting { index: usize },
    Awaiting { index: usize },
    Compositing,
    Done,
    Failed { reason: String },
}

impl JobState {
    /// `Done` and `Failed` end a job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed { .. })
    }

    /// Whether `next` is a legal successor of `self` for a job of `total` tiles.
    pub fn can_advance_to(&self, next: &JobState, total: usize) -> bool {
        use JobState::*;
        match (self, next) {
            (_, Failed { .. }) => !self.is_terminal(),
            (Idle | Done | Failed { .. }, Preparing) => true,
            (Preparing, Extracting { index: 0 }) => true,
            (Extracting { index: i }, Awaiting { index: j }) => i == j,
            (Awaiting { index: i }, Extracting { index: j }) => *j == i + 1 && *j < total,
            (Awaiting { index: i }, Compositing) => i + 1 == total,
            (Compositing, Done) => true,
            _ => false,
        }
    }
}

/// Tiles finished out of tiles planned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completed fraction in `[0, 1]`; zero before the grid is planned.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    #[serde(flatten)]
    pub state: JobState,
    pub progress: Progress,
}

impl JobStatus {
    pub fn idle() -> Self {
        Self {
            state: JobState::Idle,
            progress: Progress::default(),
        }
    }

    /// Human-readable status line.
    pub fn message(&self) -> String {
        match &self.state {
            JobState::Idle => String::new(),
            JobState::Preparing => "Preparing...".to_string(),
            JobState::Extracting { index } | JobState::Awaiting { index } => {
                format!("Processing tile {} / {}...", index + 1, self.progress.total)
            }
            JobState::Compositing => "Reassembling...".to_string(),
            JobState::Done => "Done!".to_string(),
            JobState::Failed { reason } => format!("Error: {reason}"),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Owns the sending half of the status channel.
pub struct StatusTracker {
    tx: watch::Sender<JobStatus>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(JobStatus::idle());
        Self { tx }
    }

    /// New receiver that sees the current status and every later change.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.tx.subscribe()
    }

    /// Latest published status.
    pub fn current(&self) -> JobStatus {
        self.tx.borrow().clone()
    }

    /// Move to `state`, keeping the tile counter.
    pub(crate) fn transition(&self, state: JobState) {
        self.tx.send_modify(|status| {
            debug_assert!(
                status.state.can_advance_to(&state, status.progress.total),
                "illegal transition {:?} -> {:?}",
                status.state,
                state
            );
            tracing::debug!("Job state: {:?} -> {:?}", status.state, state);
            status.state = state;
        });
    }

    /// Reset the tile counter and enter `Preparing`.
    ///
    /// The returned guard fails the job as cancelled if it is dropped before
    /// the job reaches a terminal state.
    pub(crate) fn begin(&self) -> ActiveJob<'_> {
        self.tx.send_modify(|status| {
            status.progress = Progress::default();
        });
        self.transition(JobState::Preparing);
        ActiveJob { tracker: self }
    }

    /// Record the planned tile count.
    pub(crate) fn set_total(&self, total: usize) {
        self.tx.send_modify(|status| {
            status.progress = Progress {
                completed: 0,
                total,
            };
        });
    }

    /// Count one more finished tile.
    pub(crate) fn complete_tile(&self) {
        self.tx.send_modify(|status| {
            status.progress.completed = (status.progress.completed + 1).min(status.progress.total);
        });
    }
}

/// Marks a job in flight; see [`StatusTracker::begin`].
#[must_use]
pub(crate) struct ActiveJob<'a> {
    tracker: &'a StatusTracker,
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        if !self.tracker.current().state.is_terminal() {
            tracing::debug!("Job dropped before finishing");
            self.tracker.transition(JobState::Failed {
                reason: CANCELLED.to_string(),
            });
        }
    }
}

/// Failure reason recorded for a job whose future was dropped.
pub const CANCELLED: &str = "cancelled";
