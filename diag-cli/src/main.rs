// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use diag_cli::DiagnosticsApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = DiagnosticsApp::parse();
    let output = app.init_output();

    match app.exec(output, &mut std::io::stdout().lock()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
