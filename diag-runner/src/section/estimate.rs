// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Serialize;
use std::{fmt, time::Duration};

/// Estimates under this many minutes are reported to the minute. Larger ones are rounded to
/// multiples of it.
const LARGE_ESTIMATE_STEP: u64 = 5;

/// How much longer a running section is expected to take.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", content = "minutes", rename_all = "kebab-case")]
pub enum RemainingEstimate {
    /// About this many minutes are left.
    Minutes(u64),

    /// At most a minute is left.
    LessThanMinute,

    /// A large estimate has run out but the section is still going.
    FewMoreMinutes,
}

impl RemainingEstimate {
    /// Computes the estimate for a section expected to take `estimate` that has been running for
    /// `elapsed`.
    pub fn new(estimate: Duration, elapsed: Duration) -> Self {
        let estimate_min = estimate.as_secs_f64() / 60.0;
        let elapsed_min = elapsed.as_secs_f64() / 60.0;
        let remaining = (estimate_min - elapsed_min).ceil();

        if estimate_min < LARGE_ESTIMATE_STEP as f64 {
            if remaining <= 1.0 {
                Self::LessThanMinute
            } else {
                Self::Minutes(remaining as u64)
            }
        } else if remaining <= 0.0 {
            Self::FewMoreMinutes
        } else {
            let steps = (remaining as u64).div_ceil(LARGE_ESTIMATE_STEP);
            Self::Minutes((steps * LARGE_ESTIMATE_STEP).max(LARGE_ESTIMATE_STEP))
        }
    }

    /// The number of minutes to display, if a number is shown at all.
    pub fn minutes(self) -> Option<u64> {
        match self {
            Self::Minutes(minutes) => Some(minutes),
            Self::LessThanMinute => None,
            Self::FewMoreMinutes => Some(LARGE_ESTIMATE_STEP),
        }
    }

    /// A short form suitable for a badge.
    pub fn badge_text(self) -> String {
        match self.minutes() {
            Some(minutes) => format!("{minutes} min"),
            None => "<1 min".to_owned(),
        }
    }
}

impl fmt::Display for RemainingEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(minutes) => write!(f, "about {minutes} minutes remaining"),
            Self::LessThanMinute => write!(f, "less than a minute remaining"),
            Self::FewMoreMinutes => write!(f, "just a few more minutes"),
        }
    }
}
