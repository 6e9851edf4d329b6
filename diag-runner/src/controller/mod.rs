// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The routine controller capability.
//!
//! A controller runs one routine at a time on request and reports exactly one
//! final result for it. Production controllers wrap an out-of-process system
//! service; [`FakeRoutineController`] supplies canned results for tests and for
//! the command-line front end.

mod fake;

pub use fake::*;

use crate::{
    errors::ControllerError,
    routine::{RawRoutineResult, RoutineType},
};
use std::{future::Future, sync::Arc};
use tokio::sync::oneshot;

/// The final result of one routine run, as reported by a controller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RoutineResultInfo {
    /// The routine that ran.
    pub routine: RoutineType,

    /// The result, not yet validated.
    pub result: RawRoutineResult,
}

/// Receives the single result of a routine started through
/// [`RoutineController::run_routine`].
pub type RoutineResultReceiver = oneshot::Receiver<RoutineResultInfo>;

/// The sending half used by controller implementations to report a result.
pub type RoutineResultSender = oneshot::Sender<RoutineResultInfo>;

/// Creates a channel for reporting one routine result.
pub fn routine_result_channel() -> (RoutineResultSender, RoutineResultReceiver) {
    oneshot::channel()
}

/// Runs diagnostic routines.
///
/// Implementations report exactly one result per call to [`run_routine`](Self::run_routine),
/// never intermediate progress. A controller that never reports leaves the
/// caller waiting; callers don't impose timeouts.
pub trait RoutineController {
    /// Starts running `routine`, returning a receiver for its final result.
    fn run_routine(&self, routine: RoutineType) -> RoutineResultReceiver;

    /// Returns the routines this device supports.
    fn supported_routines(
        &self,
    ) -> impl Future<Output = Result<Vec<RoutineType>, ControllerError>> + Send;
}

impl<T: RoutineController + Sync> RoutineController for &T {
    fn run_routine(&self, routine: RoutineType) -> RoutineResultReceiver {
        (**self).run_routine(routine)
    }

    fn supported_routines(
        &self,
    ) -> impl Future<Output = Result<Vec<RoutineType>, ControllerError>> + Send {
        (**self).supported_routines()
    }
}

impl<T: RoutineController + Send + Sync> RoutineController for Arc<T> {
    fn run_routine(&self, routine: RoutineType) -> RoutineResultReceiver {
        (**self).run_routine(routine)
    }

    fn supported_routines(
        &self,
    ) -> impl Future<Output = Result<Vec<RoutineType>, ControllerError>> + Send {
        (**self).supported_routines()
    }
}
