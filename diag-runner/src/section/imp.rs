// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::RemainingEstimate;
use crate::{
    executor::ExecutionOutcome,
    group::RoutineGroup,
    routine::{PowerRoutineResult, RoutineType},
    status::{BadgeType, ExecutionProgress, ResultStatusItem, TestSuiteStatus},
    time::{StopwatchStart, stopwatch},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The announcement made when a section finishes running every routine.
pub const COMPLETED_ANNOUNCEMENT: &str = "Diagnostics completed";

/// The routines a section runs: either a plain list, or a list of groups.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionRoutines {
    /// Individual routines, each shown as its own entry.
    Routines(Vec<RoutineType>),

    /// Groups of routines, each group shown as one entry.
    Groups(Vec<RoutineGroup>),
}

impl SectionRoutines {
    /// Returns true if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Routines(routines) => routines.is_empty(),
            Self::Groups(groups) => groups.is_empty(),
        }
    }
}

/// One line in a section's result list.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResultEntry {
    /// A single routine.
    Routine(ResultStatusItem),

    /// A group of routines.
    Group(RoutineGroup),
}

impl ResultEntry {
    /// The entry's progress.
    pub fn progress(&self) -> ExecutionProgress {
        match self {
            Self::Routine(item) => item.progress(),
            Self::Group(group) => group.progress(),
        }
    }

    /// The entry's badge.
    pub fn badge(&self) -> BadgeType {
        match self {
            Self::Routine(item) => item.badge(),
            Self::Group(group) => group.badge(),
        }
    }

    /// Returns the entry as a group, if it is one.
    pub fn as_group(&self) -> Option<&RoutineGroup> {
        match self {
            Self::Routine(_) => None,
            Self::Group(group) => Some(group),
        }
    }

    /// Returns the entry as a routine status item, if it is one.
    pub fn as_routine(&self) -> Option<&ResultStatusItem> {
        match self {
            Self::Routine(item) => Some(item),
            Self::Group(_) => None,
        }
    }
}

/// A titled list of routines that is run as a unit, along with its result list.
///
/// A section doesn't run anything by itself: [`SectionRunner`](super::SectionRunner) feeds it
/// the executor's status items. Driving it by hand is useful for tests and custom front ends:
///
/// 1. [`begin_run`](Self::begin_run) with the controller's supported routines,
/// 2. [`handle_status`](Self::handle_status) for every status item,
/// 3. [`finish_run`](Self::finish_run) with the executor's outcome.
#[derive(Clone, Debug)]
pub struct RoutineSection {
    name: String,
    routines: SectionRoutines,
    routine_runtime: Duration,
    entries: Vec<ResultEntry>,
    suite_status: TestSuiteStatus,
    ignore_status_updates: bool,
    announcement: Option<&'static str>,
    current_routine: Option<RoutineType>,
    last_outcome: Option<ExecutionOutcome>,
    stopwatch: Option<StopwatchStart>,
    last_duration: Option<Duration>,
    failing_group: Option<usize>,
}

impl RoutineSection {
    /// Creates a new section.
    ///
    /// `routine_runtime` is how long a full run is expected to take, used for the remaining-time
    /// estimate.
    pub fn new(
        name: impl Into<String>,
        routines: SectionRoutines,
        routine_runtime: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            routines,
            routine_runtime,
            entries: Vec::new(),
            suite_status: TestSuiteStatus::NotRunning,
            ignore_status_updates: false,
            announcement: None,
            current_routine: None,
            last_outcome: None,
            stopwatch: None,
            last_duration: None,
            failing_group: None,
        }
    }

    /// The section's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The routines this section was configured with.
    pub fn routines(&self) -> &SectionRoutines {
        &self.routines
    }

    /// The expected runtime of a full run.
    pub fn routine_runtime(&self) -> Duration {
        self.routine_runtime
    }

    /// The result list for the current or last run. Empty until the first run begins.
    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// Whether the section is running.
    pub fn suite_status(&self) -> TestSuiteStatus {
        self.suite_status
    }

    /// True while status items are being dropped because a blocking routine failed.
    ///
    /// The remaining routines still run to completion; their results just aren't shown. The
    /// group with the failure keeps receiving statuses for its own members until it finishes.
    pub fn ignore_status_updates(&self) -> bool {
        self.ignore_status_updates
    }

    /// The text to announce to the user, if any. Set when a run completes.
    pub fn announcement(&self) -> Option<&'static str> {
        self.announcement
    }

    /// The routine that most recently started running.
    pub fn current_routine(&self) -> Option<RoutineType> {
        self.current_routine
    }

    /// How the last run ended, if one has ended.
    pub fn last_outcome(&self) -> Option<ExecutionOutcome> {
        self.last_outcome
    }

    /// How long the current run has been going, or `None` if the section isn't running.
    pub fn elapsed(&self) -> Option<Duration> {
        if self.suite_status != TestSuiteStatus::Running {
            return None;
        }
        self.stopwatch
            .as_ref()
            .map(|stopwatch| stopwatch.snapshot().duration)
    }

    /// How long the current run has been going, or how long the last run took.
    ///
    /// `None` if the section has never been run.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed().or(self.last_duration)
    }

    /// Starts a new run.
    ///
    /// Plain routines the controller doesn't support are dropped from the result list. Returns
    /// the routines to hand to the executor, in order; for grouped sections this is every
    /// group's routines, one group after the other.
    pub fn begin_run(&mut self, supported: &[RoutineType]) -> Vec<RoutineType> {
        let routines = match &self.routines {
            SectionRoutines::Routines(routines) => {
                let routines: Vec<_> = routines
                    .iter()
                    .copied()
                    .filter(|routine| supported.contains(routine))
                    .collect();
                self.entries = routines
                    .iter()
                    .map(|&routine| ResultEntry::Routine(ResultStatusItem::not_started(routine)))
                    .collect();
                routines
            }
            SectionRoutines::Groups(groups) => {
                self.entries = groups
                    .iter()
                    .map(|group| {
                        let mut group = group.clone();
                        group.reset();
                        ResultEntry::Group(group)
                    })
                    .collect();
                groups
                    .iter()
                    .flat_map(|group| group.routines().iter().copied())
                    .collect()
            }
        };

        debug!(section = %self.name, count = routines.len(), "beginning run");
        self.suite_status = TestSuiteStatus::Running;
        self.ignore_status_updates = false;
        self.announcement = None;
        self.current_routine = None;
        self.last_outcome = None;
        self.stopwatch = Some(stopwatch());
        self.last_duration = None;
        self.failing_group = None;
        routines
    }

    /// Applies a status item from the executor.
    ///
    /// Returns the indexes of entries that changed, in order. A routine's status only ever
    /// changes its own entry, but a blocking failure in a group also skips every group after it.
    pub fn handle_status(&mut self, item: &ResultStatusItem) -> Vec<usize> {
        let routine = item.routine();
        if item.progress() == ExecutionProgress::Running {
            self.current_routine = Some(routine);
        }
        if self.ignore_status_updates && !self.failing_group_accepts(routine) {
            debug!(section = %self.name, %routine, progress = %item.progress(), "ignoring status");
            return Vec::new();
        }

        let Some(index) = self.entry_index_for(routine) else {
            warn!(section = %self.name, %routine, "status for a routine not in this section");
            return Vec::new();
        };

        let blocking_failure = match &mut self.entries[index] {
            ResultEntry::Routine(entry) => {
                *entry = *item;
                false
            }
            ResultEntry::Group(group) => {
                if let Err(error) = group.set_status(item) {
                    warn!(section = %self.name, %error, "rejected status");
                    return Vec::new();
                }
                group.has_blocking_failure()
            }
        };

        let mut changed = vec![index];
        if blocking_failure && !self.ignore_status_updates {
            debug!(section = %self.name, %routine, "blocking failure, skipping remaining groups");
            self.ignore_status_updates = true;
            self.failing_group = Some(index);
            for (later, entry) in self.entries.iter_mut().enumerate().skip(index + 1) {
                if let ResultEntry::Group(group) = entry
                    && group.mark_skipped()
                {
                    changed.push(later);
                }
            }
        }
        changed
    }

    /// Ends the current run.
    pub fn finish_run(&mut self, outcome: ExecutionOutcome) {
        debug!(section = %self.name, ?outcome, "run finished");
        self.last_duration = self.elapsed();
        self.ignore_status_updates = false;
        self.failing_group = None;
        self.last_outcome = Some(outcome);
        match outcome {
            ExecutionOutcome::Completed => {
                self.suite_status = TestSuiteStatus::Completed;
                self.announcement = Some(COMPLETED_ANNOUNCEMENT);
            }
            ExecutionOutcome::Cancelled => {
                self.suite_status = TestSuiteStatus::NotRunning;
            }
        }
    }

    /// The remaining-time estimate, while the section is running.
    pub fn remaining_estimate(&self) -> Option<RemainingEstimate> {
        self.elapsed()
            .map(|elapsed| RemainingEstimate::new(self.routine_runtime, elapsed))
    }

    /// The section's overall badge, or `None` if it has never been run.
    pub fn badge(&self) -> Option<BadgeType> {
        match (self.suite_status, self.last_outcome) {
            (TestSuiteStatus::Running, _) => Some(BadgeType::Running),
            (TestSuiteStatus::Completed, _) => Some(self.completed_badge()),
            (TestSuiteStatus::NotRunning, Some(_)) => Some(BadgeType::Stopped),
            (TestSuiteStatus::NotRunning, None) => None,
        }
    }

    /// The text shown in the section's badge: the remaining-time estimate while running, the
    /// badge label otherwise.
    pub fn badge_text(&self) -> Option<String> {
        if let Some(estimate) = self.remaining_estimate() {
            return Some(estimate.badge_text());
        }
        self.badge().map(|badge| badge.label().to_owned())
    }

    /// A sentence describing the section's state, or `None` if it has never been run.
    pub fn status_text(&self) -> Option<String> {
        match self.suite_status {
            TestSuiteStatus::Running => {
                if self.remaining_estimate() == Some(RemainingEstimate::FewMoreMinutes) {
                    return Some("Just a few more minutes...".to_owned());
                }
                Some(match self.current_routine {
                    Some(routine) => {
                        format!("Running {} test", routine.description().to_lowercase())
                    }
                    None => "Starting tests".to_owned(),
                })
            }
            TestSuiteStatus::Completed => {
                if let Some((routine, power)) = self.single_power_result() {
                    return Some(power_status_text(routine, power));
                }
                Some(match self.completed_badge() {
                    BadgeType::Passed => "Test succeeded".to_owned(),
                    _ => "Test failed".to_owned(),
                })
            }
            TestSuiteStatus::NotRunning => {
                if self.last_outcome.is_none() {
                    return None;
                }
                Some(match self.current_routine {
                    Some(routine) => format!("{} test stopped", routine.description()),
                    None => "Tests stopped".to_owned(),
                })
            }
        }
    }

    fn completed_badge(&self) -> BadgeType {
        let mut badge = BadgeType::Passed;
        for entry in &self.entries {
            match entry {
                ResultEntry::Routine(item) if item.is_failure() => return BadgeType::Failed,
                ResultEntry::Group(group) if group.has_blocking_failure() => {
                    return BadgeType::Failed;
                }
                ResultEntry::Group(group) if group.in_warning_state() => {
                    badge = BadgeType::Warning;
                }
                _ => {}
            }
        }
        badge
    }

    fn single_power_result(&self) -> Option<(RoutineType, &PowerRoutineResult)> {
        match self.entries.as_slice() {
            [ResultEntry::Routine(item)] => item
                .result()
                .and_then(|result| result.power_result())
                .map(|power| (item.routine(), power)),
            _ => None,
        }
    }

    // Whether `routine` is an unfinished member of the group whose blocking failure started the
    // ignoring.
    fn failing_group_accepts(&self, routine: RoutineType) -> bool {
        self.failing_group
            .and_then(|index| self.entries[index].as_group())
            .is_some_and(|group| {
                !group.progress().is_terminal()
                    && group
                        .member_progress(routine)
                        .is_some_and(|progress| !progress.is_terminal())
            })
    }

    fn entry_index_for(&self, routine: RoutineType) -> Option<usize> {
        let matches = |entry: &ResultEntry| match entry {
            ResultEntry::Routine(item) => item.routine() == routine,
            ResultEntry::Group(group) => group.contains(routine),
        };
        let pending = |entry: &ResultEntry| match entry {
            ResultEntry::Routine(item) => !item.progress().is_terminal(),
            ResultEntry::Group(group) => group
                .member_progress(routine)
                .is_some_and(|progress| !progress.is_terminal()),
        };

        // Duplicates are matched to the first entry that hasn't finished yet.
        self.entries
            .iter()
            .position(|entry| matches(entry) && pending(entry))
            .or_else(|| self.entries.iter().position(matches))
    }
}

fn power_status_text(routine: RoutineType, power: &PowerRoutineResult) -> String {
    let verb = if routine == RoutineType::BatteryDischarge {
        "Discharged"
    } else {
        "Charged"
    };
    format!(
        "{verb} {:.2}% in {} seconds.",
        f64::from(power.percent_delta.unsigned_abs()),
        power.time_delta_seconds
    )
}
