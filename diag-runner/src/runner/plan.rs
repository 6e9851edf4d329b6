// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::DiagConfig,
    policy::NetworkType,
    routine::RoutineType,
    section::{RoutineSection, SectionRoutines},
};

/// Name of the CPU section.
pub const CPU_SECTION: &str = "CPU";
/// Name of the memory section.
pub const MEMORY_SECTION: &str = "Memory";
/// Name of the battery section.
pub const BATTERY_SECTION: &str = "Battery";
/// Name of the connectivity section.
pub const CONNECTIVITY_SECTION: &str = "Connectivity";
/// Name of the section used when routines are picked explicitly.
pub const SELECTED_SECTION: &str = "Selected routines";

const CPU_ROUTINES: &[RoutineType] = &[
    RoutineType::CpuStress,
    RoutineType::CpuCache,
    RoutineType::CpuFloatingPoint,
    RoutineType::CpuPrime,
];

/// Works out which sections to run.
///
/// With no `routines`, this is the standard set of sections: CPU, memory, battery, and network
/// connectivity grouped according to the configured policy. `network` overrides the configured
/// network type.
///
/// Otherwise, `routines` are run in the order given, as a single section.
pub fn plan_sections(
    config: &DiagConfig,
    routines: &[RoutineType],
    network: Option<NetworkType>,
) -> Vec<RoutineSection> {
    let runner = config.runner();

    if !routines.is_empty() {
        return vec![RoutineSection::new(
            SELECTED_SECTION,
            SectionRoutines::Routines(routines.to_vec()),
            runner.runtime_for(routines),
        )];
    }

    let routine_section = |name: &str, routines: &[RoutineType]| {
        RoutineSection::new(
            name,
            SectionRoutines::Routines(routines.to_vec()),
            runner.runtime_for(routines),
        )
    };

    let policy = config.policy();
    let network = network.unwrap_or(policy.network);
    vec![
        routine_section(CPU_SECTION, CPU_ROUTINES),
        routine_section(MEMORY_SECTION, &[RoutineType::Memory]),
        routine_section(BATTERY_SECTION, &[RoutineType::BatteryCharge]),
        RoutineSection::new(
            CONNECTIVITY_SECTION,
            SectionRoutines::Groups(policy.routine_groups(network)),
            runner.routine_runtime,
        ),
    ]
}
