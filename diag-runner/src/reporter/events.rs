// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    executor::ExecutionOutcome,
    group::RoutineGroup,
    runner::RunStats,
    status::{BadgeType, ResultStatusItem},
};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::Duration;

/// A diagnostic event.
///
/// Events are produced by a [`DiagnosticRunner`](crate::runner::DiagnosticRunner) and consumed
/// by a reporter.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiagnosticEvent {
    /// The time at which the event was generated.
    pub timestamp: DateTime<Local>,

    /// The amount of time elapsed since the start of the run.
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,

    /// The kind of event this is.
    #[serde(flatten)]
    pub kind: DiagnosticEventKind,
}

/// The kind of diagnostic event this is.
///
/// Forms part of [`DiagnosticEvent`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DiagnosticEventKind {
    /// The run started.
    RunStarted {
        /// The names of the sections that will be run, in order.
        sections: Vec<String>,
    },

    /// A section started running.
    SectionStarted {
        /// The section's position in the run.
        index: usize,

        /// The section's name.
        section: String,
    },

    /// A routine changed state.
    RoutineStatus {
        /// The section the routine belongs to.
        section: String,

        /// The routine's new status.
        item: ResultStatusItem,
    },

    /// A group in a grouped section changed state.
    GroupUpdated {
        /// The section the group belongs to.
        section: String,

        /// The group's position in the section's result list.
        index: usize,

        /// The group after the change.
        group: RoutineGroup,
    },

    /// A section finished running.
    SectionFinished {
        /// The section's position in the run.
        index: usize,

        /// The section's name.
        section: String,

        /// Whether the section completed or was stopped.
        outcome: ExecutionOutcome,

        /// The section's final badge.
        badge: Option<BadgeType>,

        /// The section's final status text.
        status_text: Option<String>,

        /// The announcement made at the end of the section, if any.
        announcement: Option<&'static str>,

        /// How long the section ran for.
        #[serde(with = "humantime_serde")]
        duration: Option<Duration>,
    },

    /// The run finished.
    RunFinished {
        /// The time at which the run started.
        start_time: DateTime<Local>,

        /// Statistics for the run.
        stats: RunStats,
    },
}
