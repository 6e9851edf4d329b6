// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output for diagnostic runs.

use super::{
    events::{DiagnosticEvent, DiagnosticEventKind},
    helpers::{DisplayBracketedDuration, Styles, plural},
};
use crate::{
    group::RoutineGroup,
    routine::{PowerRoutineResult, RoutineType, StandardRoutineResult},
    runner::RunStats,
    status::{BadgeType, ExecutionProgress, ResultStatusItem},
};
use owo_colors::OwoColorize;
use std::{
    io::{self, Write},
    time::Duration,
};

#[derive(Debug)]
pub(super) struct DisplayReporter {
    styles: Styles,
    verbose: bool,
    // The routine in flight, along with the run's elapsed time when it started.
    routine_start: Option<(RoutineType, Duration)>,
}

impl DisplayReporter {
    pub(super) fn new(styles: Styles, verbose: bool) -> Self {
        Self {
            styles,
            verbose,
            routine_start: None,
        }
    }

    pub(super) fn write_event(
        &mut self,
        event: &DiagnosticEvent,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        match &event.kind {
            DiagnosticEventKind::RunStarted { sections } => {
                writeln!(
                    writer,
                    "{:>12} {} {}: {}",
                    "Starting".style(self.styles.pass),
                    sections.len().style(self.styles.count),
                    plural(sections.len(), "section", "sections"),
                    sections.join(", "),
                )?;
            }
            DiagnosticEventKind::SectionStarted { section, .. } => {
                writeln!(
                    writer,
                    "{:>12} {}",
                    "SECTION".style(self.styles.section),
                    section.style(self.styles.count),
                )?;
            }
            DiagnosticEventKind::RoutineStatus { item, .. } => {
                self.write_routine_status(event.elapsed, item, writer)?;
            }
            DiagnosticEventKind::GroupUpdated { group, .. } => {
                self.write_group(group, writer)?;
            }
            DiagnosticEventKind::SectionFinished {
                section,
                badge,
                status_text,
                announcement,
                duration,
                ..
            } => {
                let label = badge.map_or("DONE", BadgeType::label);
                let style = badge.map_or(self.styles.count, |badge| self.styles.for_badge(badge));
                write!(writer, "{:>12} ", label.style(style))?;
                write!(
                    writer,
                    "{}",
                    DisplayBracketedDuration(duration.unwrap_or_default())
                )?;
                match status_text {
                    Some(text) => writeln!(writer, "{section}: {text}")?,
                    None => writeln!(writer, "{section}")?,
                }
                if self.verbose
                    && let Some(announcement) = announcement
                {
                    writeln!(writer, "{:>12} {announcement}", "")?;
                }
            }
            DiagnosticEventKind::RunFinished { stats, .. } => {
                self.write_summary(event.elapsed, stats, writer)?;
            }
        }

        Ok(())
    }

    fn write_routine_status(
        &mut self,
        elapsed: Duration,
        item: &ResultStatusItem,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        let routine = item.routine();
        match item.progress() {
            ExecutionProgress::Running => {
                self.routine_start = Some((routine, elapsed));
                if self.verbose {
                    writeln!(
                        writer,
                        "{:>12} {}",
                        "START".style(self.styles.count),
                        routine.description(),
                    )?;
                }
            }
            ExecutionProgress::Completed => {
                let started = match self.routine_start.take() {
                    Some((running, started)) if running == routine => started,
                    _ => elapsed,
                };
                let Some(result) = item.result() else {
                    return Ok(());
                };
                let (label, style) = match result.simple_result() {
                    StandardRoutineResult::Passed => ("PASS", self.styles.pass),
                    StandardRoutineResult::Failed => ("FAIL", self.styles.fail),
                    StandardRoutineResult::ExecutionError => ("ERROR", self.styles.fail),
                    StandardRoutineResult::UnableToRun => ("UNABLE", self.styles.skip),
                };
                write!(writer, "{:>12} ", label.style(style))?;
                write!(
                    writer,
                    "{}",
                    DisplayBracketedDuration(elapsed.saturating_sub(started))
                )?;
                match result.power_result() {
                    Some(power) => writeln!(
                        writer,
                        "{} ({})",
                        routine.description(),
                        DisplayPowerResult(power)
                    )?,
                    None => writeln!(writer, "{}", routine.description())?,
                }
            }
            ExecutionProgress::Cancelled => {
                self.routine_start = None;
                writeln!(
                    writer,
                    "{:>12} {}",
                    "STOPPED".style(self.styles.skip),
                    routine.description(),
                )?;
            }
            // The executor never reports these.
            ExecutionProgress::NotStarted | ExecutionProgress::Skipped => {}
        }

        Ok(())
    }

    fn write_group(&self, group: &RoutineGroup, writer: &mut dyn Write) -> io::Result<()> {
        // Only report groups once there's something final to say about them.
        if !group.progress().is_terminal() && !group.has_blocking_failure() {
            return Ok(());
        }

        let badge = group.badge();
        write!(
            writer,
            "{:>12} group {}",
            badge.label().style(self.styles.for_badge(badge)),
            group.group_name(),
        )?;
        match group.failed_test() {
            Some(failed) => writeln!(writer, " (failed: {})", failed.description()),
            None => writeln!(writer),
        }
    }

    fn write_summary(
        &self,
        elapsed: Duration,
        stats: &RunStats,
        writer: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(writer, "{}", "-".repeat(12))?;
        let summary_style = if stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        write!(writer, "{:>12} ", "Summary".style(summary_style))?;
        write!(writer, "{}", DisplayBracketedDuration(elapsed))?;

        let finished = stats.finished_count();
        write!(
            writer,
            "{} {} run: {} passed",
            finished.style(self.styles.count),
            plural(finished, "routine", "routines"),
            stats.passed.style(self.styles.pass),
        )?;
        if stats.failed > 0 {
            write!(writer, ", {} failed", stats.failed.style(self.styles.fail))?;
        }
        if stats.errors > 0 {
            write!(
                writer,
                ", {} {}",
                stats.errors.style(self.styles.fail),
                plural(stats.errors, "error", "errors"),
            )?;
        }
        if stats.cancelled > 0 {
            write!(writer, ", {} cancelled", stats.cancelled.style(self.styles.skip))?;
        }
        if stats.skipped_groups > 0 {
            write!(
                writer,
                ", {} {} skipped",
                stats.skipped_groups.style(self.styles.skip),
                plural(stats.skipped_groups, "group", "groups"),
            )?;
        }
        writeln!(writer)
    }
}

struct DisplayPowerResult<'a>(&'a PowerRoutineResult);

impl std::fmt::Display for DisplayPowerResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.0.is_charging {
            "charged"
        } else {
            "discharged"
        };
        write!(
            f,
            "{verb} {}% in {}s",
            self.0.percent_delta.unsigned_abs(),
            self.0.time_delta_seconds
        )
    }
}
