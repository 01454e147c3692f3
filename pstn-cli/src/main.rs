//! CLI entry point for running PSTN dispatch simulation batches.
//!
//! Parses command-line arguments with clap, drives the batch runner, renders
//! the per-network summary to stdout, and maps errors to appropriate exit
//! codes. Logging is initialized eagerly so subsequent operations can emit
//! structured diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use pstn_cli::{
    cli::{Cli, CliError, render_summary, run_cli},
    driver::DriverError,
    logging::{self, LoggingError},
};
use pstn_core::StnErrorCode;
use tracing::error;

/// Parse CLI arguments, run the batch, render the summary, and flush the
/// output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summaries = run_cli(&cli).context("failed to run simulation batch")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summaries, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = try_main() {
        let code = err.chain().find_map(|cause| {
            // Downcast each cause so context layers do not obscure `CliError`
            // instances that carry a structured network-error code.
            let cause: &(dyn std::error::Error + 'static) = cause;
            cause.downcast_ref::<CliError>().and_then(stn_error_code)
        });

        error!(
            error = %err,
            code = ?code.map(StnErrorCode::as_str),
            "command execution failed"
        );
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Extracts the structured [`StnErrorCode`] a [`CliError`] carries, if it
/// ultimately wraps an `StnError` raised while driving the batch.
fn stn_error_code(err: &CliError) -> Option<StnErrorCode> {
    match err {
        CliError::Driver(DriverError::Stn(stn_error)) => Some(stn_error.code()),
        _ => None,
    }
}

/// Emit a fallback diagnostic to stderr when tracing initialization fails.
#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
