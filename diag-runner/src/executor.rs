// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs an ordered list of routines, one at a time.
//!
//! The main structure in this module is [`RoutineListExecutor`].

use crate::{
    controller::RoutineController,
    errors::ExecutorError,
    routine::{RoutineResult, RoutineType},
    status::ResultStatusItem,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// How a call to [`RoutineListExecutor::run_routines`] ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionOutcome {
    /// Every routine in the list completed.
    Completed,

    /// The run was cancelled through a [`CancelHandle`]. The in-flight routine and every queued
    /// routine were reported as cancelled.
    Cancelled,
}

/// Requests cancellation of an executor's current run.
///
/// Obtained through [`RoutineListExecutor::cancel_handle`].
#[derive(Clone, Debug)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancels the current run, if there is one.
    ///
    /// The controller is not asked to abort the in-flight routine; the executor stops waiting for
    /// it.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Drives a list of routines through a [`RoutineController`].
///
/// Routines run strictly sequentially: routine *i + 1* is not started until routine *i*'s
/// completed status has been delivered. Routines may contend for the same hardware, so this is
/// never relaxed.
///
/// There is no timeout. If the controller never reports a result, the run never finishes unless
/// it's cancelled.
#[derive(Debug)]
pub struct RoutineListExecutor<C> {
    controller: C,
    cancel_sender: Arc<watch::Sender<bool>>,
}

impl<C: RoutineController> RoutineListExecutor<C> {
    /// Creates a new executor backed by `controller`.
    pub fn new(controller: C) -> Self {
        let (cancel_sender, _) = watch::channel(false);
        Self {
            controller,
            cancel_sender: Arc::new(cancel_sender),
        }
    }

    /// Returns the controller this executor runs routines through.
    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Returns a handle that can cancel runs of this executor.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: self.cancel_sender.clone(),
        }
    }

    /// Runs every routine in `routines`, in order, reporting each transition to
    /// `status_callback`.
    ///
    /// Each routine produces a running status followed by a completed status carrying the
    /// controller's result. Duplicates are run once per occurrence. Returns only once the last
    /// completed status has been delivered, or once the run has been cancelled.
    ///
    /// Routine failures are ordinary results, not errors. An error is returned only if the
    /// controller breaks its contract.
    pub async fn run_routines<F>(
        &self,
        routines: &[RoutineType],
        status_callback: F,
    ) -> Result<ExecutionOutcome, ExecutorError>
    where
        F: FnMut(ResultStatusItem),
    {
        self.clear_cancel();
        self.run_routines_armed(routines, status_callback).await
    }

    /// Clears a cancellation left over from a previous run.
    ///
    /// [`run_routines`](Self::run_routines) does this itself. Callers that have to do work before
    /// the run starts clear it up front and then call
    /// [`run_routines_armed`](Self::run_routines_armed), so that a cancel arriving in between is
    /// kept.
    pub fn clear_cancel(&self) {
        self.cancel_sender.send_replace(false);
    }

    /// Like [`run_routines`](Self::run_routines), but keeps any cancellation requested since the
    /// last [`clear_cancel`](Self::clear_cancel).
    pub async fn run_routines_armed<F>(
        &self,
        routines: &[RoutineType],
        mut status_callback: F,
    ) -> Result<ExecutionOutcome, ExecutorError>
    where
        F: FnMut(ResultStatusItem),
    {
        let mut cancel_receiver = self.cancel_sender.subscribe();

        let total = routines.len();
        for (index, &routine) in routines.iter().enumerate() {
            if *cancel_receiver.borrow_and_update() {
                return Ok(cancel_remaining(&routines[index..], &mut status_callback));
            }

            debug!(%routine, index, total, "starting routine");
            status_callback(ResultStatusItem::running(routine));
            let receiver = self.controller.run_routine(routine);

            let info = tokio::select! {
                biased;

                () = wait_for_cancel(&mut cancel_receiver) => {
                    debug!(%routine, "run cancelled while routine was in flight");
                    return Ok(cancel_remaining(&routines[index..], &mut status_callback));
                }
                info = receiver => {
                    info.map_err(|_| ExecutorError::ControllerGone { routine })?
                }
            };

            if info.routine != routine {
                return Err(ExecutorError::MismatchedResult {
                    expected: routine,
                    actual: info.routine,
                });
            }
            let result = RoutineResult::try_from(info.result)
                .map_err(|error| ExecutorError::MalformedResult { routine, error })?;

            debug!(%routine, result = %result.simple_result(), "routine completed");
            status_callback(ResultStatusItem::completed(routine, result));
        }

        Ok(ExecutionOutcome::Completed)
    }
}

fn cancel_remaining<F>(remaining: &[RoutineType], status_callback: &mut F) -> ExecutionOutcome
where
    F: FnMut(ResultStatusItem),
{
    for &routine in remaining {
        status_callback(ResultStatusItem::cancelled(routine));
    }
    ExecutionOutcome::Cancelled
}

async fn wait_for_cancel(receiver: &mut watch::Receiver<bool>) {
    loop {
        if *receiver.borrow_and_update() {
            return;
        }
        if receiver.changed().await.is_err() {
            // The executor owns the sender, so this only happens if it's gone.
            futures::future::pending::<()>().await;
        }
    }
}
