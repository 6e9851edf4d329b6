// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for running system diagnostic routines.
//!
//! The basic flow: a [`RoutineController`](controller::RoutineController) runs
//! individual routines, a [`RoutineListExecutor`](executor::RoutineListExecutor)
//! drives an ordered list of them one at a time, and
//! [`RoutineGroup`](group::RoutineGroup)s and
//! [`RoutineSection`](section::RoutineSection)s fold the resulting status items
//! into something a front end can display. [`runner`] and [`reporter`] wrap all
//! of that into a blocking run that emits events.

pub mod config;
pub mod controller;
pub mod errors;
pub mod executor;
pub mod group;
pub mod policy;
pub mod reporter;
pub mod routine;
pub mod runner;
pub mod section;
pub mod status;
mod time;
