// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::status::BadgeType;
use owo_colors::Style;
use std::{fmt, time::Duration};

#[derive(Debug, Default, Clone)]
pub(super) struct Styles {
    pub(super) count: Style,
    pub(super) pass: Style,
    pub(super) fail: Style,
    pub(super) skip: Style,
    pub(super) section: Style,
}

impl Styles {
    pub(super) fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.section = Style::new().blue().bold();
    }

    pub(super) fn for_badge(&self, badge: BadgeType) -> Style {
        match badge {
            BadgeType::Passed => self.pass,
            BadgeType::Failed => self.fail,
            BadgeType::Warning | BadgeType::Stopped | BadgeType::Skipped => self.skip,
            BadgeType::Queued | BadgeType::Running => self.count,
        }
    }
}

pub(super) struct DisplayBracketedDuration(pub(super) Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // Right-aligned to 8 characters, with three digits after the decimal point.
        write!(f, "[{:>8.3?}s] ", self.0.as_secs_f64())
    }
}

pub(super) fn plural(count: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if count == 1 { singular } else { plural }
}
