//! Sends resolved assignments to the window sink.
//!
//! Every assignment is attempted on its own task, at most
//! `max_parallel_moves` at a time, and each move is bounded by
//! `move_timeout`. Failures are collected rather than aborting the batch, and
//! nothing is retried here; callers can feed `failed_assignments()` back in.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::common::config::Settings;
use crate::layout_engine::resolver::{Assignment, Resolution};
use crate::model::app::WindowHandle;
use crate::sys::geometry::Rect;
use crate::sys::window::{SinkError, WindowSink};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Sink(SinkError),
    Timeout,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Sink(e) => write!(f, "{e}"),
            FailureReason::Timeout => f.write_str("timed out"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedAssignment {
    pub handle: WindowHandle,
    pub target: Rect,
    pub reason: FailureReason,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrangementReport {
    pub applied: usize,
    /// In the order the assignments were given.
    pub failed: Vec<FailedAssignment>,
}

impl ArrangementReport {
    pub fn is_complete(&self) -> bool { self.failed.is_empty() }

    /// The subset worth handing back to `apply` for another attempt.
    pub fn failed_assignments(&self) -> Vec<Assignment> {
        self.failed
            .iter()
            .map(|f| Assignment { handle: f.handle, target: f.target })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrangementStatus {
    Applied,
    PartiallyApplied,
    Failed,
}

/// The structured result of an arranging command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrangementOutcome {
    /// Name of the layout that was applied, if the command applied one.
    pub layout: Option<String>,
    pub status: ArrangementStatus,
    pub report: ArrangementReport,
    pub resolution: Option<Resolution>,
}

impl ArrangementOutcome {
    pub fn new(layout: Option<String>, resolution: Option<Resolution>, report: ArrangementReport) -> Self {
        let status = match (report.applied, report.failed.len()) {
            (_, 0) => ArrangementStatus::Applied,
            (0, _) => ArrangementStatus::Failed,
            _ => ArrangementStatus::PartiallyApplied,
        };
        Self { layout, status, report, resolution }
    }

    pub fn from_resolution(resolution: Resolution, report: ArrangementReport) -> Self {
        Self::new(Some(resolution.layout.clone()), Some(resolution), report)
    }
}

pub struct ArrangementExecutor<S> {
    sink: Arc<S>,
    permits: Arc<Semaphore>,
    move_timeout: Duration,
}

impl<S: WindowSink> ArrangementExecutor<S> {
    pub fn new(sink: Arc<S>, max_parallel_moves: usize, move_timeout: Duration) -> Self {
        Self {
            sink,
            permits: Arc::new(Semaphore::new(max_parallel_moves.max(1))),
            move_timeout,
        }
    }

    pub fn from_settings(sink: Arc<S>, settings: &Settings) -> Self {
        Self::new(sink, settings.max_parallel_moves, settings.move_timeout())
    }

    pub async fn apply(&self, assignments: Vec<Assignment>) -> ArrangementReport {
        let mut tasks = JoinSet::new();
        for (idx, assignment) in assignments.iter().copied().enumerate() {
            let sink = self.sink.clone();
            let permits = self.permits.clone();
            let move_timeout = self.move_timeout;
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let moved = tokio::time::timeout(
                    move_timeout,
                    sink.move_resize(assignment.handle, assignment.target),
                )
                .await;
                let result = match moved {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(FailureReason::Sink(e)),
                    Err(_) => Err(FailureReason::Timeout),
                };
                (idx, result)
            });
        }

        let mut results: Vec<Option<Result<(), FailureReason>>> = vec![None; assignments.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!("move task failed: {e}"),
            }
        }

        let mut report = ArrangementReport::default();
        for (assignment, result) in assignments.into_iter().zip(results) {
            let reason = match result {
                Some(Ok(())) => {
                    report.applied += 1;
                    continue;
                }
                Some(Err(reason)) => reason,
                None => FailureReason::Sink(SinkError::Rejected {
                    handle: assignment.handle,
                    reason: "move task did not complete".to_string(),
                }),
            };
            debug!(handle = ?assignment.handle, %reason, "window move failed");
            report.failed.push(FailedAssignment {
                handle: assignment.handle,
                target: assignment.target,
                reason,
            });
        }
        report
    }
}
