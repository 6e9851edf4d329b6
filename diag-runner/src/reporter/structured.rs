// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Machine-readable output for diagnostic runs.
//!
//! Each event is written as a single line of JSON. Events carry a `type` field naming the event
//! kind, alongside `timestamp` and `elapsed`.

use super::events::DiagnosticEvent;
use crate::errors::WriteEventError;
use std::io::Write;

/// Writes events as JSON lines.
#[derive(Debug, Default)]
pub struct StructuredReporter {
    _private: (),
}

impl StructuredReporter {
    /// Creates a new structured reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `event` to `writer` as a single line of JSON.
    pub fn write_event(
        &mut self,
        event: &DiagnosticEvent,
        writer: &mut dyn Write,
    ) -> Result<(), WriteEventError> {
        serde_json::to_writer(&mut *writer, event).map_err(WriteEventError::Serialize)?;
        writeln!(writer).map_err(WriteEventError::Io)
    }
}
