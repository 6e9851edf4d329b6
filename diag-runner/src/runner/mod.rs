// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The diagnostic runner.
//!
//! The main structure in this module is [`DiagnosticRunner`].

mod imp;
mod plan;

pub use imp::*;
pub use plan::*;
