// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use color_eyre::eyre::{Result, ensure};
use diag_runner::{
    config::DiagConfig,
    controller::FakeRoutineController,
    policy::NetworkType,
    reporter::{DiagnosticEvent, DiagnosticEventKind, DiagnosticReporterBuilder, MessageFormat},
    routine::{PowerRoutineResult, RoutineType, StandardRoutineResult},
    runner::{
        BATTERY_SECTION, CONNECTIVITY_SECTION, DiagnosticRunnerBuilder, RunStats, plan_sections,
    },
    section::COMPLETED_ANNOUNCEMENT,
    status::{BadgeType, ExecutionProgress},
};
use pretty_assertions::assert_eq;

fn passing_controller() -> FakeRoutineController {
    let controller = FakeRoutineController::new();
    for &routine in RoutineType::ALL {
        if routine.is_power_routine() {
            controller.set_fake_power_routine_result(
                routine,
                PowerRoutineResult {
                    simple_result: StandardRoutineResult::Passed,
                    is_charging: true,
                    percent_delta: 4,
                    time_delta_seconds: 30,
                },
            );
        } else {
            controller.set_fake_standard_routine_result(routine, StandardRoutineResult::Passed);
        }
    }
    controller
}

fn run(
    controller: &FakeRoutineController,
    routines: &[RoutineType],
    network: Option<NetworkType>,
) -> Result<(RunStats, Vec<DiagnosticEvent>)> {
    let config = DiagConfig::default_config();
    let mut builder = DiagnosticRunnerBuilder::default();
    builder.add_sections(plan_sections(&config, routines, network));
    let runner = builder.build(controller)?;

    let mut events = Vec::new();
    let stats = runner.execute(|event| events.push(event))?;
    Ok((stats, events))
}

fn section_results(events: &[DiagnosticEvent]) -> Vec<(String, Option<BadgeType>, Option<String>)> {
    events
        .iter()
        .filter_map(|event| match &event.kind {
            DiagnosticEventKind::SectionFinished {
                section,
                badge,
                status_text,
                ..
            } => Some((section.clone(), *badge, status_text.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn default_run_passes() -> Result<()> {
    let controller = passing_controller();
    let (stats, events) = run(&controller, &[], Some(NetworkType::Ethernet))?;

    ensure!(stats.is_success(), "run should succeed: {stats:?}");
    assert_eq!(stats.sections_started, 4);
    // 4 CPU + memory + battery + 9 ethernet connectivity routines.
    assert_eq!(stats.passed, 15);

    let results = section_results(&events);
    assert_eq!(results.len(), 4);
    assert!(
        results
            .iter()
            .all(|(_, badge, _)| *badge == Some(BadgeType::Passed)),
        "{results:?}"
    );
    let battery = results
        .iter()
        .find(|(name, _, _)| name == BATTERY_SECTION)
        .expect("battery section ran");
    assert_eq!(
        battery.2.as_deref(),
        Some("Charged 4.00% in 30 seconds.")
    );

    for &routine in RoutineType::ALL {
        let expected = match routine {
            RoutineType::BatteryDischarge
            | RoutineType::SignalStrength
            | RoutineType::HasSecureWiFiConnection
            | RoutineType::ArcHttp
            | RoutineType::ArcPing
            | RoutineType::ArcDnsResolution => 0,
            _ => 1,
        };
        assert_eq!(controller.run_count(routine), expected, "for {routine}");
    }
    Ok(())
}

#[test]
fn unsupported_routines_are_not_run() -> Result<()> {
    let controller = passing_controller();
    controller.set_fake_supported_routines([RoutineType::Memory]);
    let (stats, events) = run(
        &controller,
        &[RoutineType::CpuCache, RoutineType::Memory],
        None,
    )?;

    assert_eq!(stats.finished_count(), 1);
    assert_eq!(controller.run_count(RoutineType::CpuCache), 0);
    let announcements: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.kind {
            DiagnosticEventKind::SectionFinished { announcement, .. } => *announcement,
            _ => None,
        })
        .collect();
    assert_eq!(announcements, vec![COMPLETED_ANNOUNCEMENT]);
    Ok(())
}

#[test]
fn blocking_connectivity_failure_skips_later_groups() -> Result<()> {
    let controller = passing_controller();
    controller.set_fake_standard_routine_result(
        RoutineType::LanConnectivity,
        StandardRoutineResult::Failed,
    );
    controller.set_fake_standard_routine_result(
        RoutineType::SignalStrength,
        StandardRoutineResult::Failed,
    );
    let (stats, events) = run(&controller, &[], Some(NetworkType::Wifi))?;

    ensure!(!stats.is_success(), "run should fail");
    assert_eq!(stats.skipped_groups, 2);

    let results = section_results(&events);
    let connectivity = results
        .iter()
        .find(|(name, _, _)| name == CONNECTIVITY_SECTION)
        .expect("connectivity section ran");
    assert_eq!(connectivity.1, Some(BadgeType::Failed));
    assert_eq!(connectivity.2.as_deref(), Some("Test failed"));

    // Every routine still runs, even after the blocking failure.
    assert_eq!(controller.run_count(RoutineType::HttpsLatency), 1);

    let final_groups: Vec<_> = events
        .iter()
        .filter_map(|event| match &event.kind {
            DiagnosticEventKind::GroupUpdated { group, .. }
                if group.progress() == ExecutionProgress::Skipped =>
            {
                Some(group.group_name().to_owned())
            }
            _ => None,
        })
        .collect();
    assert_eq!(final_groups, vec!["Name resolution", "Internet connectivity"]);
    Ok(())
}

#[test]
fn reporter_output_for_a_run() -> Result<()> {
    let controller = passing_controller();
    controller.set_fake_standard_routine_result(RoutineType::Memory, StandardRoutineResult::Failed);

    let config = DiagConfig::default_config();
    let mut builder = DiagnosticRunnerBuilder::default();
    builder.add_sections(plan_sections(&config, &[RoutineType::Memory], None));

    let mut reporter_builder = DiagnosticReporterBuilder::default();
    reporter_builder.set_message_format(MessageFormat::Json);
    let mut reporter = reporter_builder.build(Vec::new());

    let stats = builder
        .build(&controller)?
        .try_execute(|event| reporter.write_event(&event))?;
    assert_eq!(stats.failed, 1);

    let output = String::from_utf8(reporter.into_inner())?;
    let types: Vec<String> = output
        .lines()
        .map(|line| -> Result<String> {
            let value: serde_json::Value = serde_json::from_str(line)?;
            Ok(value["type"].as_str().unwrap_or_default().to_owned())
        })
        .collect::<Result<_>>()?;
    assert_eq!(
        types,
        vec![
            "run-started",
            "section-started",
            "routine-status",
            "routine-status",
            "section-finished",
            "run-finished",
        ]
    );

    let finished: serde_json::Value = serde_json::from_str(
        output
            .lines()
            .nth(4)
            .expect("section-finished line is present"),
    )?;
    assert_eq!(finished["outcome"], "completed");
    assert_eq!(finished["badge"], "failed");
    assert_eq!(finished["status-text"], "Test failed");
    assert_eq!(finished["announcement"], COMPLETED_ANNOUNCEMENT);
    Ok(())
}
