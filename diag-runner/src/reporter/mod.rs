// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the progress of a diagnostic run in human and machine-readable formats.
//!
//! The main type here is [`DiagnosticReporter`], which is constructed via a
//! [`DiagnosticReporterBuilder`].

mod displayer;
mod events;
mod helpers;
pub mod structured;

pub use events::*;

use crate::errors::WriteEventError;
use displayer::DisplayReporter;
use helpers::Styles;
use std::io::Write;
use structured::StructuredReporter;

/// The format reporters write events in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MessageFormat {
    /// Aligned, optionally colored lines meant for a terminal.
    #[default]
    Human,

    /// One JSON object per line.
    Json,
}

/// Diagnostic reporter options.
#[derive(Debug, Default)]
pub struct DiagnosticReporterBuilder {
    message_format: MessageFormat,
    colorize: bool,
    verbose: bool,
}

impl DiagnosticReporterBuilder {
    /// Sets the output format.
    pub fn set_message_format(&mut self, message_format: MessageFormat) -> &mut Self {
        self.message_format = message_format;
        self
    }

    /// Enables colored human output.
    pub fn set_colorize(&mut self, colorize: bool) -> &mut Self {
        self.colorize = colorize;
        self
    }

    /// Also report routines starting, and announcements, in human output.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new reporter that writes to `writer`.
    pub fn build<W: Write>(&self, writer: W) -> DiagnosticReporter<W> {
        let inner = match self.message_format {
            MessageFormat::Human => {
                let mut styles = Styles::default();
                if self.colorize {
                    styles.colorize();
                }
                ReporterImpl::Display(DisplayReporter::new(styles, self.verbose))
            }
            MessageFormat::Json => ReporterImpl::Structured(StructuredReporter::new()),
        };
        DiagnosticReporter { inner, writer }
    }
}

/// Writes diagnostic events to an output.
#[derive(Debug)]
pub struct DiagnosticReporter<W> {
    inner: ReporterImpl,
    writer: W,
}

#[derive(Debug)]
enum ReporterImpl {
    Display(DisplayReporter),
    Structured(StructuredReporter),
}

impl<W: Write> DiagnosticReporter<W> {
    /// Writes an event, flushing the output afterwards.
    pub fn write_event(&mut self, event: &DiagnosticEvent) -> Result<(), WriteEventError> {
        match &mut self.inner {
            ReporterImpl::Display(display) => display
                .write_event(event, &mut self.writer)
                .map_err(WriteEventError::Io)?,
            ReporterImpl::Structured(structured) => {
                structured.write_event(event, &mut self.writer)?
            }
        }
        self.writer.flush().map_err(WriteEventError::Io)
    }

    /// Consumes the reporter, returning the output.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
