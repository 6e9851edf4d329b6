// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::RoutineSection;
use crate::{
    controller::RoutineController,
    errors::SectionRunError,
    executor::{CancelHandle, ExecutionOutcome, RoutineListExecutor},
    group::RoutineGroup,
    status::ResultStatusItem,
};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A change reported while a [`SectionRunner`] runs its section.
#[derive(Clone, Debug)]
pub enum SectionUpdate {
    /// The executor reported a status item. Reported even when the section is ignoring updates.
    Status(ResultStatusItem),

    /// A group entry changed as a result of the preceding status item.
    GroupUpdated {
        /// The entry's index in the section's result list.
        index: usize,

        /// The group after the change.
        group: RoutineGroup,
    },
}

/// Runs a [`RoutineSection`] through a controller.
///
/// The section can be inspected with [`with_section`](Self::with_section) while a run is in
/// progress, and the run stopped with [`stop`](Self::stop).
#[derive(Debug)]
pub struct SectionRunner<C> {
    section: Mutex<RoutineSection>,
    executor: RoutineListExecutor<C>,
}

impl<C: RoutineController> SectionRunner<C> {
    /// Creates a new runner for `section`, backed by `controller`.
    pub fn new(section: RoutineSection, controller: C) -> Self {
        Self {
            section: Mutex::new(section),
            executor: RoutineListExecutor::new(controller),
        }
    }

    /// Returns the controller routines are run through.
    pub fn controller(&self) -> &C {
        self.executor.controller()
    }

    /// Calls `f` with the current state of the section.
    ///
    /// `f` must not call back into this runner.
    pub fn with_section<R>(&self, f: impl FnOnce(&RoutineSection) -> R) -> R {
        f(&self.lock())
    }

    /// Returns a copy of the current state of the section.
    pub fn snapshot(&self) -> RoutineSection {
        self.lock().clone()
    }

    /// Returns a handle that can stop runs from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.executor.cancel_handle()
    }

    /// Stops the current run. The running routine and every queued routine are cancelled.
    ///
    /// Has no effect if nothing is running.
    pub fn stop(&self) {
        debug!(section = %self.lock().name(), "stop requested");
        self.executor.cancel_handle().cancel();
    }

    /// Tells the runner whether its section is being shown. Hiding a section stops its run.
    pub fn set_active(&self, is_active: bool) {
        if !is_active {
            self.stop();
        }
    }

    /// Runs every supported routine in the section.
    pub async fn run_tests(&self) -> Result<ExecutionOutcome, SectionRunError> {
        self.run_tests_with(|_| {}).await
    }

    /// Runs every supported routine in the section, reporting changes to `callback`.
    ///
    /// The section has already been updated by the time `callback` is called.
    pub async fn run_tests_with<F>(&self, mut callback: F) -> Result<ExecutionOutcome, SectionRunError>
    where
        F: FnMut(SectionUpdate),
    {
        let name = self.lock().name().to_owned();
        // A stop that arrives while the supported routines are being fetched still applies.
        self.executor.clear_cancel();
        let supported = self
            .controller()
            .supported_routines()
            .await
            .map_err(|error| SectionRunError::SupportedRoutines {
                section: name.clone(),
                error,
            })?;

        let routines = self.lock().begin_run(&supported);
        let result = self
            .executor
            .run_routines_armed(&routines, |item| {
                let groups: Vec<_> = {
                    let mut section = self.lock();
                    section
                        .handle_status(&item)
                        .into_iter()
                        .filter_map(|index| {
                            section.entries()[index]
                                .as_group()
                                .map(|group| (index, group.clone()))
                        })
                        .collect()
                };
                callback(SectionUpdate::Status(item));
                for (index, group) in groups {
                    callback(SectionUpdate::GroupUpdated { index, group });
                }
            })
            .await;

        match result {
            Ok(outcome) => {
                self.lock().finish_run(outcome);
                Ok(outcome)
            }
            Err(error) => {
                // The run can't continue, so treat it like a stop.
                self.lock().finish_run(ExecutionOutcome::Cancelled);
                Err(SectionRunError::Executor {
                    section: name,
                    error,
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoutineSection> {
        // Never held across an await point.
        self.section
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
