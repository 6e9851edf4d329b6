// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostics configuration.
//!
//! The main structure in this module is [`DiagConfig`].

mod elements;
mod imp;

pub use elements::*;
pub use imp::*;
