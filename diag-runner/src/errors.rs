// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the diagnostics runner.

use crate::routine::RoutineType;
use camino::Utf8PathBuf;
use config::ConfigError;
use thiserror::Error;

/// A routine result that did not carry exactly one of a standard or a power result.
///
/// Controllers must populate exactly one variant. Anything else is a contract
/// violation and is rejected rather than coerced.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MalformedRoutineResultError {
    /// Both the standard and the power result were set.
    #[error("routine result has both a simple result and a power result")]
    BothPresent,

    /// Neither result was set.
    #[error("routine result has neither a simple result nor a power result")]
    NonePresent,
}

/// A status item was reported to a group that doesn't contain its routine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("routine `{routine}` is not a member of group `{group_name}`")]
pub struct UnknownRoutineError {
    routine: RoutineType,
    group_name: String,
}

impl UnknownRoutineError {
    pub(crate) fn new(routine: RoutineType, group_name: impl Into<String>) -> Self {
        Self {
            routine,
            group_name: group_name.into(),
        }
    }

    /// Returns the routine that was reported.
    pub fn routine(&self) -> RoutineType {
        self.routine
    }

    /// Returns the name of the group the status was reported to.
    pub fn group_name(&self) -> &str {
        &self.group_name
    }
}

/// An error returned while parsing a [`RoutineType`] from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized routine: {input}\n(known routines: {})",
    RoutineType::variants().join(", "),
)]
pub struct RoutineTypeParseError {
    input: String,
}

impl RoutineTypeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error returned while parsing a [`NetworkType`](crate::policy::NetworkType) from a string.
#[derive(Clone, Debug, Error)]
#[error("unrecognized network type: {input}\n(known values: wifi, ethernet, cellular)")]
pub struct NetworkTypeParseError {
    input: String,
}

impl NetworkTypeParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error reported by a routine controller.
#[derive(Clone, Debug, Error)]
pub enum ControllerError {
    /// The controller is no longer reachable.
    #[error("routine controller disconnected")]
    Disconnected,

    /// The controller reported a failure of its own.
    #[error("routine controller error: {message}")]
    Other {
        /// A description of the failure.
        message: String,
    },
}

/// An error that occurred while the executor was running a list of routines.
///
/// Routine failures are not errors: a failing or erroring routine completes with
/// the corresponding [`StandardRoutineResult`](crate::routine::StandardRoutineResult).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The controller returned a result that wasn't exactly one of simple or power.
    #[error("controller returned a malformed result for `{routine}`")]
    MalformedResult {
        /// The routine whose result was malformed.
        routine: RoutineType,

        /// The underlying error.
        #[source]
        error: MalformedRoutineResultError,
    },

    /// The controller reported a result for a different routine than the one in flight.
    #[error("controller reported a result for `{actual}` while `{expected}` was running")]
    MismatchedResult {
        /// The routine that was running.
        expected: RoutineType,

        /// The routine the result was reported for.
        actual: RoutineType,
    },

    /// The controller dropped its end of the result channel without reporting.
    #[error("controller went away while `{routine}` was running")]
    ControllerGone {
        /// The routine that was running.
        routine: RoutineType,
    },
}

/// An error that occurred while running a section of routines.
#[derive(Debug, Error)]
pub enum SectionRunError {
    /// The controller couldn't report which routines it supports.
    #[error("failed to query supported routines for section `{section}`")]
    SupportedRoutines {
        /// The section's name.
        section: String,

        /// The underlying error.
        #[source]
        error: ControllerError,
    },

    /// The executor failed while running the section's routines.
    #[error("failed to run routines for section `{section}`")]
    Executor {
        /// The section's name.
        section: String,

        /// The underlying error.
        #[source]
        error: ExecutorError,
    },
}

/// An error that occurred while parsing diagnostics configuration.
#[derive(Debug, Error)]
#[error("failed to parse diagnostics config{}", display_config_file(.config_file.as_ref()))]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self { config_file, kind }
    }

    /// Returns the config file this error is for, if any.
    ///
    /// `None` means the embedded default configuration or the environment.
    pub fn config_file(&self) -> Option<&Utf8PathBuf> {
        self.config_file.as_ref()
    }

    /// Returns the kind of error.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

fn display_config_file(config_file: Option<&Utf8PathBuf>) -> String {
    match config_file {
        Some(path) => format!(" at `{path}`"),
        None => String::new(),
    }
}

/// The kind of [`ConfigParseError`].
#[derive(Debug, Error)]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The fake controller was configured to wait for manual resolution, which only tests can
    /// provide.
    #[error("fake-controller.delay = \"manual\" can only be used from tests")]
    ManualDelay,

    /// A configured group was empty.
    #[error("group `{group_name}` has no routines")]
    EmptyGroup {
        /// The group's label.
        group_name: String,
    },
}

/// An error that occurred while building a [`DiagnosticRunner`](crate::runner::DiagnosticRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerBuildError {
    /// An error occurred while creating the tokio runtime.
    #[error("error creating tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),
}

/// An error that occurred while executing a [`DiagnosticRunner`](crate::runner::DiagnosticRunner).
#[derive(Debug, Error)]
pub enum RunnerExecuteError<E> {
    /// A section couldn't be run.
    #[error(transparent)]
    Section(#[from] SectionRunError),

    /// The event callback returned an error. The run was stopped as a result.
    #[error("error reporting diagnostic event")]
    Report(#[source] E),
}

/// An error that occurred while writing an event to a reporter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An I/O error occurred.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while serializing a structured event.
    #[error("error serializing event")]
    Serialize(#[source] serde_json::Error),
}
