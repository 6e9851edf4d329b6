// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs system diagnostic routines from the command line.
//!
//! Routines are run through a fake controller whose results come from configuration, so runs are
//! reproducible. See `default-config.toml` in `diag-runner` for the available settings.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
