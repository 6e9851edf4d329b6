// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::Result;
use diag_runner::{
    config::DiagConfig,
    controller::FakeRoutineController,
    reporter::{DiagnosticEventKind, DiagnosticReporterBuilder},
    routine::RoutineType,
    runner::{DiagnosticRunnerBuilder, plan_sections},
    status::BadgeType,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn configured_controller_drives_a_run() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config_path = dir.path().join("diagnostics.toml");
    std::fs::write(
        &config_path,
        indoc! {r#"
            [runner]
            routine-runtime = "10m"

            [policy]
            network = "cellular"

            [[policy.groups]]
            name = "DNS"
            routines = [
                { routine = "dns-resolver-present" },
                { routine = "dns-latency", blocking = false },
            ]

            [fake-controller]
            supported-routines = ["memory", "battery-charge", "dns-resolver-present", "dns-latency"]

            [fake-controller.results]
            memory = "passed"
            dns-resolver-present = "passed"
            dns-latency = "failed"
            battery-charge = { simple-result = "passed", is-charging = true, percent-delta = 3, time-delta-seconds = 20 }
        "#},
    )?;

    let config = DiagConfig::from_sources(dir.path(), Some(&config_path))?;
    assert_eq!(config.runner().routine_runtime, Duration::from_secs(600));

    let controller = FakeRoutineController::from_config(config.fake_controller());
    let sections = plan_sections(&config, &[], None);
    assert_eq!(sections[0].routine_runtime(), Duration::from_secs(600));

    let mut builder = DiagnosticRunnerBuilder::default();
    builder.add_sections(sections);

    let mut reporter = DiagnosticReporterBuilder::default().build(Vec::new());
    let mut badges = Vec::new();
    let stats = builder.build(&controller)?.try_execute(|event| {
        if let DiagnosticEventKind::SectionFinished { section, badge, .. } = &event.kind {
            badges.push((section.clone(), *badge));
        }
        reporter.write_event(&event)
    })?;

    // The CPU section is empty: none of its routines are supported.
    assert_eq!(
        badges,
        vec![
            ("CPU".to_owned(), Some(BadgeType::Passed)),
            ("Memory".to_owned(), Some(BadgeType::Passed)),
            ("Battery".to_owned(), Some(BadgeType::Passed)),
            ("Connectivity".to_owned(), Some(BadgeType::Warning)),
        ]
    );
    assert_eq!(stats.passed, 3);
    assert_eq!(stats.failed, 1);
    assert_eq!(controller.run_count(RoutineType::CpuStress), 0);

    let output = String::from_utf8(reporter.into_inner())?;
    assert!(
        output.contains("     WARNING group DNS (failed: DNS latency)\n"),
        "unexpected output:\n{output}"
    );
    assert!(
        output.contains("Battery: Charged 3.00% in 20 seconds.\n"),
        "unexpected output:\n{output}"
    );
    Ok(())
}
