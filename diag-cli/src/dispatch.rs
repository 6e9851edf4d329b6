// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DiagnosticsExitCode, ExpectedError, Result},
    output::{ListStyles, OutputContext, OutputOpts},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use diag_runner::{
    config::DiagConfig,
    controller::FakeRoutineController,
    policy::NetworkType,
    reporter::{DiagnosticReporterBuilder, MessageFormat},
    routine::RoutineType,
    runner::{DiagnosticRunnerBuilder, plan_sections},
    section::{RoutineSection, SectionRoutines},
};
use itertools::Itertools;
use owo_colors::OwoColorize;
use std::io::Write;
use swrite::{SWrite, swrite, swriteln};
use tracing::debug;

/// Runs system diagnostic routines and reports their results.
///
/// Routines are grouped into sections (CPU, memory, battery and connectivity) and run one at a
/// time, in order.
#[derive(Debug, Parser)]
#[command(
    version,
    name = "diagnostics",
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct DiagnosticsApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl DiagnosticsApp {
    /// Initializes the output context, including logging.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, writing results to `writer`.
    ///
    /// Returns the exit code for the process.
    pub fn exec(self, output: OutputContext, writer: &mut dyn Write) -> Result<i32> {
        let config = self.config_opts.make_config()?;
        match self.command {
            Command::Run(opts) => opts.exec(&config, output, writer),
            Command::List(opts) => opts.exec(&config, output, writer),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Directory to look for .config/diagnostics.toml in
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    root: Utf8PathBuf,

    /// Config file [default: ROOT/.config/diagnostics.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<DiagConfig> {
        let config = DiagConfig::from_sources(&self.root, self.config_file.as_deref())?;
        debug!(config_file = ?config.config_file(), "loaded config");
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run diagnostic routines
    ///
    /// With no routines given, runs the CPU, memory, battery and connectivity sections. Otherwise
    /// runs the given routines, in order, as a single section.
    Run(RunOpts),

    /// List the sections and routines that would be run
    List(ListOpts),
}

#[derive(Debug, Args)]
struct RunOpts {
    /// Routines to run [default: every section]
    #[arg(value_name = "ROUTINES")]
    routines: Vec<RoutineType>,

    /// Network type to check connectivity for [default: from config]
    #[arg(long, value_name = "TYPE")]
    network: Option<NetworkType>,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormatOpt,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpt {
    /// Human-readable output
    #[default]
    Human,

    /// One JSON object per event
    Json,
}

impl From<MessageFormatOpt> for MessageFormat {
    fn from(opt: MessageFormatOpt) -> Self {
        match opt {
            MessageFormatOpt::Human => MessageFormat::Human,
            MessageFormatOpt::Json => MessageFormat::Json,
        }
    }
}

impl RunOpts {
    fn exec(
        self,
        config: &DiagConfig,
        output: OutputContext,
        writer: &mut dyn Write,
    ) -> Result<i32> {
        let sections = plan_sections(config, &self.routines, self.network);
        let controller = FakeRoutineController::from_config(config.fake_controller());

        let mut runner_builder = DiagnosticRunnerBuilder::default();
        runner_builder.add_sections(sections);
        let runner = runner_builder.build(&controller)?;

        let mut reporter_builder = DiagnosticReporterBuilder::default();
        reporter_builder
            .set_message_format(self.message_format.into())
            .set_colorize(output.color.should_colorize(supports_color::Stream::Stdout))
            .set_verbose(output.verbose);
        let mut reporter = reporter_builder.build(writer);

        let stats = runner.try_execute(|event| reporter.write_event(&event))?;
        if stats.is_success() {
            Ok(DiagnosticsExitCode::OK)
        } else {
            Ok(DiagnosticsExitCode::ROUTINES_FAILED)
        }
    }
}

#[derive(Debug, Args)]
struct ListOpts {
    /// Network type to list connectivity groups for [default: from config]
    #[arg(long, value_name = "TYPE")]
    network: Option<NetworkType>,
}

impl ListOpts {
    fn exec(
        self,
        config: &DiagConfig,
        output: OutputContext,
        writer: &mut dyn Write,
    ) -> Result<i32> {
        let mut styles = ListStyles::default();
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }

        let sections = plan_sections(config, &[], self.network);
        writer
            .write_all(format_sections(&sections, &styles).as_bytes())
            .map_err(|err| ExpectedError::WriteOutputError { err })?;
        Ok(DiagnosticsExitCode::OK)
    }
}

fn format_sections(sections: &[RoutineSection], styles: &ListStyles) -> String {
    let mut out = String::new();
    for section in sections {
        swriteln!(
            out,
            "{} (about {}):",
            section.name().style(styles.section),
            humantime::format_duration(section.routine_runtime()),
        );
        match section.routines() {
            SectionRoutines::Routines(routines) => {
                for &routine in routines {
                    write_routine(&mut out, routine, false, styles);
                }
            }
            SectionRoutines::Groups(groups) => {
                for group in groups {
                    swriteln!(out, "  {}:", group.group_name().style(styles.group));
                    for &routine in group.routines() {
                        write_routine(&mut out, routine, group.is_non_blocking(routine), styles);
                    }
                }
            }
        }
    }

    let others: Vec<_> = other_routines(sections).collect();
    swriteln!(
        out,
        "\nOther routines: {}",
        others
            .iter()
            .map(|routine| routine.style(styles.routine))
            .join(", ")
    );
    out
}

fn write_routine(out: &mut String, routine: RoutineType, non_blocking: bool, styles: &ListStyles) {
    swrite!(
        out,
        "    {:<28} {}",
        routine.style(styles.routine),
        routine.description()
    );
    if non_blocking {
        swrite!(out, " {}", "(non-blocking)".style(styles.non_blocking));
    }
    out.push('\n');
}

/// Routines that can be named explicitly but aren't part of any default section.
fn other_routines(sections: &[RoutineSection]) -> impl Iterator<Item = RoutineType> + '_ {
    RoutineType::ALL.iter().copied().filter(move |&routine| {
        !sections.iter().any(|section| match section.routines() {
            SectionRoutines::Routines(routines) => routines.contains(&routine),
            SectionRoutines::Groups(groups) => groups.iter().any(|group| group.contains(routine)),
        })
    })
}
