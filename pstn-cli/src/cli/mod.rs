//! Command-line interface orchestration for the PSTN dispatch batch runner.
//!
//! Parses CLI arguments, expands positional paths into a concrete list of
//! PSTN JSON inputs, assembles a validated run configuration, and drives the
//! worker pool over every discovered network.

mod commands;

pub use commands::{Cli, CliError, StrategyArg, build_config, expand_input_paths, render_summary, run_cli};
