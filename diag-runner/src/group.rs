// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Groups of routines displayed as a single unit.
//!
//! A [`RoutineGroup`] folds the status items of its member routines into one
//! progress value and one pass/warning/fail indicator.

use crate::{
    errors::UnknownRoutineError,
    routine::{RoutineProperties, RoutineType},
    status::{BadgeType, ExecutionProgress, ResultStatusItem},
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

/// A named set of routines treated as one unit for pass/fail display, e.g. all Wi-Fi checks.
///
/// Membership and the blocking/non-blocking partition are fixed at construction. Group progress
/// only moves forward within a run: it's `Running` as soon as any member has started, and
/// `Completed` once every member has completed. Call [`reset`](Self::reset) before running the
/// group again.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoutineGroup {
    group_name: String,
    routines: Vec<RoutineType>,
    non_blocking_routines: BTreeSet<RoutineType>,
    #[serde(skip)]
    member_progress: IndexMap<RoutineType, ExecutionProgress>,
    progress: ExecutionProgress,
    failed_test: Option<RoutineType>,
    in_warning_state: bool,
}

impl RoutineGroup {
    /// Creates a new group from its members, in run order, and a display label.
    ///
    /// If a routine is listed more than once, the first occurrence wins.
    pub fn new(
        routines: impl IntoIterator<Item = RoutineProperties>,
        group_name: impl Into<String>,
    ) -> Self {
        let mut member_progress = IndexMap::new();
        let mut non_blocking_routines = BTreeSet::new();
        for properties in routines {
            if member_progress.contains_key(&properties.routine) {
                continue;
            }
            member_progress.insert(properties.routine, ExecutionProgress::NotStarted);
            if properties.is_non_blocking() {
                non_blocking_routines.insert(properties.routine);
            }
        }

        Self {
            group_name: group_name.into(),
            routines: member_progress.keys().copied().collect(),
            non_blocking_routines,
            member_progress,
            progress: ExecutionProgress::NotStarted,
            failed_test: None,
            in_warning_state: false,
        }
    }

    /// The group's display label.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// The member routines, in run order.
    pub fn routines(&self) -> &[RoutineType] {
        &self.routines
    }

    /// The members whose failure does not stop sibling routines.
    pub fn non_blocking_routines(&self) -> &BTreeSet<RoutineType> {
        &self.non_blocking_routines
    }

    /// Returns true if `routine` is a member of this group.
    pub fn contains(&self, routine: RoutineType) -> bool {
        self.member_progress.contains_key(&routine)
    }

    /// Returns true if `routine` is a non-blocking member.
    pub fn is_non_blocking(&self, routine: RoutineType) -> bool {
        self.non_blocking_routines.contains(&routine)
    }

    /// The group's aggregate progress.
    pub fn progress(&self) -> ExecutionProgress {
        self.progress
    }

    /// The latest progress recorded for a member, or `None` if it isn't a member.
    pub fn member_progress(&self, routine: RoutineType) -> Option<ExecutionProgress> {
        self.member_progress.get(&routine).copied()
    }

    /// The first member that completed with a failing result, if any.
    pub fn failed_test(&self) -> Option<RoutineType> {
        self.failed_test
    }

    /// True once any member has failed.
    pub fn in_warning_state(&self) -> bool {
        self.in_warning_state
    }

    /// True if the first failing member is a blocking routine.
    pub fn has_blocking_failure(&self) -> bool {
        self.failed_test
            .is_some_and(|routine| !self.is_non_blocking(routine))
    }

    /// Records the latest status of a member routine.
    ///
    /// The member's own state is overwritten by each call. The first failing completed member
    /// becomes [`failed_test`](Self::failed_test) and is never replaced by later failures.
    ///
    /// Returns an error, leaving the group untouched, if the routine isn't a member.
    pub fn set_status(&mut self, item: &ResultStatusItem) -> Result<(), UnknownRoutineError> {
        let routine = item.routine();
        let Some(member) = self.member_progress.get_mut(&routine) else {
            return Err(UnknownRoutineError::new(routine, &self.group_name));
        };
        *member = item.progress();

        if item.progress() == ExecutionProgress::Completed
            && item.is_failure()
            && self.failed_test.is_none()
        {
            debug!(group = %self.group_name, %routine, "first failure in group");
            self.failed_test = Some(routine);
            self.in_warning_state = true;
        }

        self.update_progress();
        Ok(())
    }

    /// Marks a group that hasn't started as skipped.
    ///
    /// Returns true if the group was skipped.
    pub fn mark_skipped(&mut self) -> bool {
        if self.progress == ExecutionProgress::NotStarted {
            self.progress = ExecutionProgress::Skipped;
            true
        } else {
            false
        }
    }

    /// Returns the group to its just-constructed state, ready to be run again.
    pub fn reset(&mut self) {
        for progress in self.member_progress.values_mut() {
            *progress = ExecutionProgress::NotStarted;
        }
        self.progress = ExecutionProgress::NotStarted;
        self.failed_test = None;
        self.in_warning_state = false;
    }

    /// Returns the badge for the group.
    ///
    /// Failures take precedence over progress: a blocking failure shows as failed and a
    /// non-blocking one as a warning, even while other members are still running.
    pub fn badge(&self) -> BadgeType {
        if self.failed_test.is_some() {
            return if self.has_blocking_failure() {
                BadgeType::Failed
            } else {
                BadgeType::Warning
            };
        }
        match self.progress {
            ExecutionProgress::NotStarted => BadgeType::Queued,
            ExecutionProgress::Running => BadgeType::Running,
            ExecutionProgress::Completed => BadgeType::Passed,
            ExecutionProgress::Cancelled => BadgeType::Stopped,
            ExecutionProgress::Skipped => BadgeType::Skipped,
        }
    }

    fn update_progress(&mut self) {
        if self.progress.is_terminal() {
            return;
        }

        let members = self.member_progress.values();
        let derived = if members.clone().all(|p| *p == ExecutionProgress::Completed) {
            ExecutionProgress::Completed
        } else if members.clone().any(|p| *p == ExecutionProgress::Cancelled) {
            ExecutionProgress::Cancelled
        } else if members
            .clone()
            .any(|p| matches!(p, ExecutionProgress::Running | ExecutionProgress::Completed))
        {
            ExecutionProgress::Running
        } else {
            ExecutionProgress::NotStarted
        };

        if derived.rank() >= self.progress.rank() {
            self.progress = derived;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routine::StandardRoutineResult;
    use pretty_assertions::assert_eq;

    fn wifi_group(blocking: bool) -> RoutineGroup {
        RoutineGroup::new(
            [
                RoutineProperties::new(RoutineType::SignalStrength, blocking),
                RoutineProperties::new(RoutineType::HasSecureWiFiConnection, blocking),
            ],
            "wifiGroupLabel",
        )
    }

    fn passed(routine: RoutineType) -> ResultStatusItem {
        ResultStatusItem::completed(routine, StandardRoutineResult::Passed)
    }

    fn failed(routine: RoutineType) -> ResultStatusItem {
        ResultStatusItem::completed(routine, StandardRoutineResult::Failed)
    }

    #[test]
    fn construction() {
        let group = RoutineGroup::new(
            [
                RoutineProperties::new(RoutineType::SignalStrength, false),
                RoutineProperties::new(RoutineType::CaptivePortal, true),
                RoutineProperties::new(RoutineType::SignalStrength, true),
            ],
            "wifi",
        );
        assert_eq!(
            group.routines(),
            &[RoutineType::SignalStrength, RoutineType::CaptivePortal]
        );
        assert_eq!(
            group.non_blocking_routines(),
            &BTreeSet::from([RoutineType::SignalStrength])
        );
        assert_eq!(group.progress(), ExecutionProgress::NotStarted);
        assert_eq!(group.failed_test(), None);
        assert!(!group.in_warning_state());
        assert_eq!(group.badge(), BadgeType::Queued);
    }

    #[test]
    fn progress_completes_only_when_all_members_complete() {
        let mut group = wifi_group(true);

        group
            .set_status(&ResultStatusItem::running(RoutineType::SignalStrength))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Running);

        group.set_status(&passed(RoutineType::SignalStrength)).unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Running);
        assert_eq!(group.badge(), BadgeType::Running);

        group
            .set_status(&ResultStatusItem::running(RoutineType::HasSecureWiFiConnection))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Running);

        group
            .set_status(&passed(RoutineType::HasSecureWiFiConnection))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Completed);
        assert_eq!(group.badge(), BadgeType::Passed);
        assert_eq!(group.failed_test(), None);
        assert!(!group.in_warning_state());
    }

    #[test]
    fn first_failure_wins() {
        let mut group = wifi_group(false);

        group.set_status(&failed(RoutineType::SignalStrength)).unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::SignalStrength));
        assert!(group.in_warning_state());

        group
            .set_status(&failed(RoutineType::HasSecureWiFiConnection))
            .unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::SignalStrength));
        assert!(group.in_warning_state());
        assert_eq!(group.progress(), ExecutionProgress::Completed);
    }

    #[test]
    fn repeated_failure_is_idempotent() {
        let mut group = wifi_group(true);
        let item = failed(RoutineType::HasSecureWiFiConnection);

        group.set_status(&item).unwrap();
        group.set_status(&item).unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::HasSecureWiFiConnection));

        group.set_status(&failed(RoutineType::SignalStrength)).unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::HasSecureWiFiConnection));
    }

    #[test]
    fn later_pass_does_not_clear_failure() {
        let mut group = wifi_group(true);
        group.set_status(&failed(RoutineType::SignalStrength)).unwrap();
        group.set_status(&passed(RoutineType::SignalStrength)).unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::SignalStrength));
        assert!(group.in_warning_state());
    }

    #[test]
    fn power_failures_count() {
        let mut group = RoutineGroup::new(
            [RoutineProperties::new(RoutineType::BatteryCharge, true)],
            "power",
        );
        group
            .set_status(&ResultStatusItem::completed(
                RoutineType::BatteryCharge,
                crate::routine::PowerRoutineResult {
                    simple_result: StandardRoutineResult::Failed,
                    is_charging: true,
                    percent_delta: 0,
                    time_delta_seconds: 30,
                },
            ))
            .unwrap();
        assert_eq!(group.failed_test(), Some(RoutineType::BatteryCharge));
    }

    #[test]
    fn badge_distinguishes_blocking_failures() {
        let mut non_blocking = wifi_group(false);
        non_blocking
            .set_status(&failed(RoutineType::SignalStrength))
            .unwrap();
        assert_eq!(non_blocking.progress(), ExecutionProgress::Running);
        assert!(!non_blocking.has_blocking_failure());
        assert_eq!(non_blocking.badge(), BadgeType::Warning);

        let mut blocking = wifi_group(true);
        blocking.set_status(&failed(RoutineType::SignalStrength)).unwrap();
        assert!(blocking.has_blocking_failure());
        assert_eq!(blocking.badge(), BadgeType::Failed);
    }

    #[test]
    fn progress_never_regresses() {
        let mut group = wifi_group(true);
        group.set_status(&passed(RoutineType::SignalStrength)).unwrap();
        group
            .set_status(&passed(RoutineType::HasSecureWiFiConnection))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Completed);

        group
            .set_status(&ResultStatusItem::running(RoutineType::SignalStrength))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Completed);
        assert_eq!(
            group.member_progress(RoutineType::SignalStrength),
            Some(ExecutionProgress::Running)
        );

        group.reset();
        assert_eq!(group.progress(), ExecutionProgress::NotStarted);
        assert_eq!(group.failed_test(), None);
    }

    #[test]
    fn cancelled_member_cancels_group() {
        let mut group = wifi_group(true);
        group.set_status(&passed(RoutineType::SignalStrength)).unwrap();
        group
            .set_status(&ResultStatusItem::cancelled(RoutineType::HasSecureWiFiConnection))
            .unwrap();
        assert_eq!(group.progress(), ExecutionProgress::Cancelled);
        assert_eq!(group.badge(), BadgeType::Stopped);
    }

    #[test]
    fn skipping() {
        let mut group = wifi_group(true);
        assert!(group.mark_skipped());
        assert_eq!(group.progress(), ExecutionProgress::Skipped);
        assert_eq!(group.badge(), BadgeType::Skipped);

        let mut started = wifi_group(true);
        started
            .set_status(&ResultStatusItem::running(RoutineType::SignalStrength))
            .unwrap();
        assert!(!started.mark_skipped());
        assert_eq!(started.progress(), ExecutionProgress::Running);
    }

    #[test]
    fn unknown_routine_is_rejected() {
        let mut group = wifi_group(true);
        let err = group.set_status(&failed(RoutineType::Memory)).unwrap_err();
        assert_eq!(err.routine(), RoutineType::Memory);
        assert_eq!(err.group_name(), "wifiGroupLabel");
        assert_eq!(group.failed_test(), None);
        assert_eq!(group.progress(), ExecutionProgress::NotStarted);
    }
}
