// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod stopwatch;

pub(crate) use stopwatch::*;
