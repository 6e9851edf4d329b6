// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use diag_runner::errors::{
    ConfigParseError, RunnerBuildError, RunnerExecuteError, SectionRunError, WriteEventError,
};
use std::error::Error;
use thiserror::Error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes returned by the `diagnostics` binary.
#[doc(hidden)]
pub struct DiagnosticsExitCode;

impl DiagnosticsExitCode {
    /// Every routine passed.
    pub const OK: i32 = 0;

    /// Something went wrong before any routines were run, e.g. an invalid config file.
    pub const SETUP_ERROR: i32 = 96;

    /// At least one routine failed, errored or was stopped.
    pub const ROUTINES_FAILED: i32 = 100;

    /// The controller broke its contract while routines were running.
    pub const RUN_ERROR: i32 = 104;

    /// Writing output failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders: errors are printed through the logger with
// display_to_stderr.

/// An error that stops the `diagnostics` binary.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("runner build error")]
    RunnerBuildError {
        #[from]
        err: RunnerBuildError,
    },
    #[error("diagnostic run error")]
    RunError {
        #[source]
        err: SectionRunError,
    },
    #[error("error writing output")]
    WriteEventError {
        #[source]
        err: WriteEventError,
    },
    #[error("error writing output")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
}

impl From<RunnerExecuteError<WriteEventError>> for ExpectedError {
    fn from(err: RunnerExecuteError<WriteEventError>) -> Self {
        match err {
            RunnerExecuteError::Section(err) => Self::RunError { err },
            RunnerExecuteError::Report(err) => Self::WriteEventError { err },
        }
    }
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } | Self::RunnerBuildError { .. } => {
                DiagnosticsExitCode::SETUP_ERROR
            }
            Self::RunError { .. } => DiagnosticsExitCode::RUN_ERROR,
            Self::WriteEventError { .. } | Self::WriteOutputError { .. } => {
                DiagnosticsExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                // The message names the config file, if there is one.
                tracing::error!("{err}");
                err.source()
            }
            Self::RunnerBuildError { err } => {
                tracing::error!("failed to build diagnostic runner");
                Some(err as &dyn Error)
            }
            Self::RunError { err } => {
                tracing::error!("{err}");
                err.source()
            }
            Self::WriteEventError { err } => {
                tracing::error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::WriteOutputError { err } => {
                tracing::error!("failed to write to output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            tracing::error!(target: "diag_cli::no_heading", "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
