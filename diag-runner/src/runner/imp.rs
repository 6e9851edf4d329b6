// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    controller::RoutineController,
    errors::{RunnerBuildError, RunnerExecuteError, SectionRunError},
    executor::ExecutionOutcome,
    reporter::{DiagnosticEvent, DiagnosticEventKind},
    routine::StandardRoutineResult,
    section::{ResultEntry, RoutineSection, SectionRunner, SectionUpdate},
    status::{ExecutionProgress, ResultStatusItem},
    time::{StopwatchStart, stopwatch},
};
use serde::Serialize;
use std::convert::Infallible;
use tokio::runtime::Runtime;
use tracing::debug;

/// Diagnostic runner options.
#[derive(Debug, Default)]
pub struct DiagnosticRunnerBuilder {
    sections: Vec<RoutineSection>,
}

impl DiagnosticRunnerBuilder {
    /// Adds a section to the end of the run.
    pub fn add_section(&mut self, section: RoutineSection) -> &mut Self {
        self.sections.push(section);
        self
    }

    /// Adds several sections to the end of the run, in order.
    pub fn add_sections(&mut self, sections: impl IntoIterator<Item = RoutineSection>) -> &mut Self {
        self.sections.extend(sections);
        self
    }

    /// Creates a new diagnostic runner that runs routines through `controller`.
    pub fn build<C>(self, controller: C) -> Result<DiagnosticRunner<C>, RunnerBuildError>
    where
        C: RoutineController + Sync,
    {
        // Routines share hardware and run one at a time, so a single thread is enough.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RunnerBuildError::TokioRuntimeCreate)?;

        Ok(DiagnosticRunner {
            sections: self.sections,
            controller,
            runtime,
        })
    }
}

/// Context for running diagnostic sections.
///
/// Created using [`DiagnosticRunnerBuilder::build`].
#[derive(Debug)]
pub struct DiagnosticRunner<C> {
    sections: Vec<RoutineSection>,
    controller: C,
    runtime: Runtime,
}

impl<C> DiagnosticRunner<C>
where
    C: RoutineController + Sync,
{
    /// Returns the sections that will be run, in order.
    pub fn sections(&self) -> &[RoutineSection] {
        &self.sections
    }

    /// Runs every section in order, calling `callback` with each event.
    pub fn execute<F>(self, mut callback: F) -> Result<RunStats, RunnerExecuteError<Infallible>>
    where
        F: FnMut(DiagnosticEvent),
    {
        self.try_execute::<Infallible, _>(|event| {
            callback(event);
            Ok(())
        })
    }

    /// Runs every section in order, calling `callback` with each event.
    ///
    /// If the callback returns an error, the section that's running is stopped and no further
    /// sections are started. Events for the stop are still passed to the callback, and the first
    /// error is returned.
    pub fn try_execute<E, F>(self, mut callback: F) -> Result<RunStats, RunnerExecuteError<E>>
    where
        F: FnMut(DiagnosticEvent) -> Result<(), E>,
    {
        let mut first_error = None;

        let res = self.runtime.block_on(run_sections(
            &self.controller,
            self.sections,
            |event| match callback(event) {
                Ok(()) => true,
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                    false
                }
            },
        ));

        match (res, first_error) {
            (Ok(stats), None) => Ok(stats),
            (Ok(_), Some(error)) => Err(RunnerExecuteError::Report(error)),
            (Err(error), _) => Err(error.into()),
        }
    }
}

async fn run_sections<C, F>(
    controller: &C,
    sections: Vec<RoutineSection>,
    callback: F,
) -> Result<RunStats, SectionRunError>
where
    C: RoutineController + Sync,
    F: FnMut(DiagnosticEvent) -> bool,
{
    let mut cx = EventContext::new(callback);
    let mut stats = RunStats::default();

    cx.emit(DiagnosticEventKind::RunStarted {
        sections: sections
            .iter()
            .map(|section| section.name().to_owned())
            .collect(),
    });

    for (index, section) in sections.into_iter().enumerate() {
        if cx.is_cancelled() {
            debug!(section = %section.name(), "not starting section: run was cancelled");
            break;
        }

        let name = section.name().to_owned();
        let runner = SectionRunner::new(section, controller);
        let cancel_handle = runner.cancel_handle();
        cx.emit(DiagnosticEventKind::SectionStarted {
            index,
            section: name.clone(),
        });

        let outcome = runner
            .run_tests_with(|update| {
                let kind = match update {
                    SectionUpdate::Status(item) => {
                        stats.record(&item);
                        DiagnosticEventKind::RoutineStatus {
                            section: name.clone(),
                            item,
                        }
                    }
                    SectionUpdate::GroupUpdated { index, group } => {
                        DiagnosticEventKind::GroupUpdated {
                            section: name.clone(),
                            index,
                            group,
                        }
                    }
                };
                cx.emit(kind);
                if cx.is_cancelled() {
                    cancel_handle.cancel();
                }
            })
            .await?;

        let section = runner.snapshot();
        stats.record_section(&section, outcome);
        cx.emit(DiagnosticEventKind::SectionFinished {
            index,
            section: name,
            outcome,
            badge: section.badge(),
            status_text: section.status_text(),
            announcement: section.announcement(),
            duration: section.duration(),
        });
    }

    cx.emit(DiagnosticEventKind::RunFinished {
        start_time: cx.stopwatch.snapshot().start_time,
        stats,
    });
    Ok(stats)
}

struct EventContext<F> {
    stopwatch: StopwatchStart,
    callback: F,
    cancelled: bool,
}

impl<F> EventContext<F>
where
    F: FnMut(DiagnosticEvent) -> bool,
{
    fn new(callback: F) -> Self {
        Self {
            stopwatch: stopwatch(),
            callback,
            cancelled: false,
        }
    }

    fn emit(&mut self, kind: DiagnosticEventKind) {
        let snapshot = self.stopwatch.snapshot();
        let event = DiagnosticEvent {
            timestamp: snapshot.end_time(),
            elapsed: snapshot.duration,
            kind,
        };
        if !(self.callback)(event) {
            self.cancelled = true;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Statistics for a diagnostic run.
///
/// Routine counts cover every routine the controller reported on, including routines whose
/// results a section ignored after a blocking failure.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunStats {
    /// The number of sections that were started.
    pub sections_started: usize,

    /// The number of sections that were stopped before completing.
    pub sections_stopped: usize,

    /// The number of routines that passed.
    pub passed: usize,

    /// The number of routines that failed.
    pub failed: usize,

    /// The number of routines that errored or couldn't be run.
    pub errors: usize,

    /// The number of routines that were cancelled.
    pub cancelled: usize,

    /// The number of groups skipped after an earlier blocking failure.
    pub skipped_groups: usize,
}

impl RunStats {
    /// Returns true if every section completed and no routine failed, errored or was cancelled.
    pub fn is_success(&self) -> bool {
        self.sections_stopped == 0 && self.failed == 0 && self.errors == 0 && self.cancelled == 0
    }

    /// Returns the number of routines that finished, one way or another.
    pub fn finished_count(&self) -> usize {
        self.passed + self.failed + self.errors + self.cancelled
    }

    fn record(&mut self, item: &ResultStatusItem) {
        match (item.progress(), item.result()) {
            (ExecutionProgress::Completed, Some(result)) => match result.simple_result() {
                StandardRoutineResult::Passed => self.passed += 1,
                StandardRoutineResult::Failed => self.failed += 1,
                StandardRoutineResult::ExecutionError | StandardRoutineResult::UnableToRun => {
                    self.errors += 1
                }
            },
            (ExecutionProgress::Cancelled, _) => self.cancelled += 1,
            _ => {}
        }
    }

    fn record_section(&mut self, section: &RoutineSection, outcome: ExecutionOutcome) {
        self.sections_started += 1;
        if outcome == ExecutionOutcome::Cancelled {
            self.sections_stopped += 1;
        }
        self.skipped_groups += section
            .entries()
            .iter()
            .filter(|entry| matches!(entry, ResultEntry::Group(_)))
            .filter(|entry| entry.progress() == ExecutionProgress::Skipped)
            .count();
    }
}
