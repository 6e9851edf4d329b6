// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution progress and status items.

use crate::routine::{RoutineResult, RoutineType};
use serde::Serialize;
use std::fmt;

/// The lifecycle phase of a routine run, or of a group of routines.
///
/// Legal transitions for a single routine are `NotStarted → Running →
/// Completed`, with `Cancelled` reachable from `NotStarted` and `Running`, and
/// `Skipped` reachable from `NotStarted`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionProgress {
    /// Queued, not yet started.
    NotStarted,

    /// Currently running.
    Running,

    /// Finished with a result.
    Completed,

    /// Stopped before producing a result.
    Cancelled,

    /// Not run because an earlier blocking routine failed.
    Skipped,
}

impl ExecutionProgress {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Skipped)
    }

    // Terminal states all share the highest rank.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Running => 1,
            Self::Completed | Self::Cancelled | Self::Skipped => 2,
        }
    }
}

impl fmt::Display for ExecutionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// The status of a single routine at one point in its lifecycle.
///
/// A fresh item is created for every transition. The result is present if and only if the
/// progress is [`ExecutionProgress::Completed`]; the constructors are the only way to build one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResultStatusItem {
    routine: RoutineType,
    progress: ExecutionProgress,
    result: Option<RoutineResult>,
}

impl ResultStatusItem {
    /// A routine that hasn't started yet.
    pub fn not_started(routine: RoutineType) -> Self {
        Self::without_result(routine, ExecutionProgress::NotStarted)
    }

    /// A routine that is running.
    pub fn running(routine: RoutineType) -> Self {
        Self::without_result(routine, ExecutionProgress::Running)
    }

    /// A routine that finished with a result.
    pub fn completed(routine: RoutineType, result: impl Into<RoutineResult>) -> Self {
        Self {
            routine,
            progress: ExecutionProgress::Completed,
            result: Some(result.into()),
        }
    }

    /// A routine that was stopped before it produced a result.
    pub fn cancelled(routine: RoutineType) -> Self {
        Self::without_result(routine, ExecutionProgress::Cancelled)
    }

    /// A routine that was skipped.
    pub fn skipped(routine: RoutineType) -> Self {
        Self::without_result(routine, ExecutionProgress::Skipped)
    }

    fn without_result(routine: RoutineType, progress: ExecutionProgress) -> Self {
        Self {
            routine,
            progress,
            result: None,
        }
    }

    /// The routine this item describes.
    pub fn routine(&self) -> RoutineType {
        self.routine
    }

    /// The progress of the routine.
    pub fn progress(&self) -> ExecutionProgress {
        self.progress
    }

    /// The result of the routine, present only once it has completed.
    pub fn result(&self) -> Option<&RoutineResult> {
        self.result.as_ref()
    }

    /// Returns true if the routine completed with anything other than a pass.
    pub fn is_failure(&self) -> bool {
        self.result.is_some_and(|result| result.is_failure())
    }
}

/// A short summary of a routine's or a group's state, as shown next to it in a result list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeType {
    /// Waiting to run.
    Queued,

    /// Running.
    Running,

    /// Everything passed.
    Passed,

    /// A blocking routine failed.
    Failed,

    /// Only non-blocking routines failed.
    Warning,

    /// Stopped by the user.
    Stopped,

    /// Skipped after an earlier blocking failure.
    Skipped,
}

impl BadgeType {
    /// Returns the uppercase label for this badge.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Warning => "WARNING",
            Self::Stopped => "STOPPED",
            Self::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ResultStatusItem {
    /// Returns the badge for this routine's current state.
    pub fn badge(&self) -> BadgeType {
        match self.progress {
            ExecutionProgress::NotStarted => BadgeType::Queued,
            ExecutionProgress::Running => BadgeType::Running,
            ExecutionProgress::Completed if self.is_failure() => BadgeType::Failed,
            ExecutionProgress::Completed => BadgeType::Passed,
            ExecutionProgress::Cancelled => BadgeType::Stopped,
            ExecutionProgress::Skipped => BadgeType::Skipped,
        }
    }
}

/// The status of a whole test suite, e.g. one section's run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestSuiteStatus {
    /// Not running: either never started or stopped.
    #[default]
    NotRunning,

    /// Routines are being run.
    Running,

    /// All routines have finished.
    Completed,
}
