// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sections: titled lists of routines that are run, stopped and displayed as a unit.
//!
//! [`RoutineSection`] holds a section's result list and derives its badge, status text and
//! remaining-time estimate. [`SectionRunner`] drives a section through a
//! [`RoutineListExecutor`](crate::executor::RoutineListExecutor).

mod estimate;
mod imp;
mod runner;

pub use estimate::*;
pub use imp::*;
pub use runner::*;
