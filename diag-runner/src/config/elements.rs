// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    controller::FakeDelay,
    group::RoutineGroup,
    policy::{NetworkType, routine_groups},
    routine::{
        PowerRoutineResult, RoutineProperties, RoutineResult, RoutineType, StandardRoutineResult,
    },
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::time::Duration;

/// Runner settings: the `[runner]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// How long a section of standard routines is expected to take.
    #[serde(with = "humantime_serde")]
    pub routine_runtime: Duration,

    /// How long a section of battery routines is expected to take.
    #[serde(with = "humantime_serde")]
    pub power_routine_runtime: Duration,
}

impl RunnerConfig {
    /// Returns the expected runtime of a section made up of `routines`.
    ///
    /// Sections consisting only of battery routines use the power runtime.
    pub fn runtime_for(&self, routines: &[RoutineType]) -> Duration {
        if !routines.is_empty() && routines.iter().all(|routine| routine.is_power_routine()) {
            self.power_routine_runtime
        } else {
            self.routine_runtime
        }
    }
}

/// Grouping policy settings: the `[policy]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyConfig {
    /// The network whose connectivity is checked.
    pub network: NetworkType,

    /// Custom groups. If non-empty, these replace the groups for `network`.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

impl PolicyConfig {
    /// Returns the connectivity groups to run for `network`.
    ///
    /// Custom groups take precedence over the built-in ones.
    pub fn routine_groups(&self, network: NetworkType) -> Vec<RoutineGroup> {
        if self.groups.is_empty() {
            routine_groups(network)
        } else {
            self.groups
                .iter()
                .map(|group| RoutineGroup::new(group.routines.iter().copied(), &group.name))
                .collect()
        }
    }
}

/// A custom routine group.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupConfig {
    /// The group's display label.
    pub name: String,

    /// The group's routines, in run order. Routines are blocking unless marked otherwise.
    pub routines: Vec<RoutineProperties>,
}

/// Fake controller settings: the `[fake-controller]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FakeControllerConfig {
    /// How long routines take to report.
    pub delay: FakeDelay,

    /// The supported routines, or `None` for all of them.
    #[serde(default)]
    pub supported_routines: Option<Vec<RoutineType>>,

    /// Canned results, by routine.
    #[serde(default)]
    pub results: IndexMap<RoutineType, ConfiguredResult>,
}

/// A canned result in the fake controller's configuration.
///
/// Written either as a standard result name (`"passed"`) or as a table with the fields of a
/// [`PowerRoutineResult`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum ConfiguredResult {
    /// A standard result.
    Standard(StandardRoutineResult),

    /// A power result.
    Power(PowerRoutineResult),
}

impl ConfiguredResult {
    /// Converts this into the result the controller will report.
    pub fn to_routine_result(self) -> RoutineResult {
        match self {
            Self::Standard(result) => RoutineResult::Simple(result),
            Self::Power(result) => RoutineResult::Power(result),
        }
    }
}
