//! Command implementations and argument parsing for the PSTN dispatch CLI.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pstn_core::{DecoupleStrategy, ExecutionStrategy};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{ConfigError, DispatchStrategy, SimulationConfig, SimulationConfigBuilder};
use crate::driver::{DriverError, RunSummary};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "pstn", about = "Simulate dynamic execution of Probabilistic Simple Temporal Networks.")]
pub struct Cli {
    /// Worker thread count (defaults to the available parallelism).
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Samples to run per input network.
    #[arg(short = 's', long = "samples", default_value_t = 100)]
    pub samples: u64,

    /// Execution strategy to dispatch under.
    #[arg(short = 'e', long = "execution", value_enum, default_value_t = StrategyArg::Early)]
    pub execution: StrategyArg,

    /// AR-phase reschedule threshold.
    #[arg(long = "ar-threshold", default_value_t = 0.0)]
    pub ar_threshold: f64,

    /// SI/SC/ALP reschedule threshold.
    #[arg(long = "si-threshold", default_value_t = 0.0)]
    pub si_threshold: f64,

    /// Base RNG seed (randomly chosen if absent).
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// CSV file to append results to.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Suppress live progress reporting.
    #[arg(long = "no-live")]
    pub no_live: bool,

    /// PSTN JSON paths or directories to recurse into.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Dispatch strategies selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum StrategyArg {
    /// Dispatch as soon as possible, no reschedule.
    Early,
    /// Solve SREA once and reuse its guide.
    Srea,
    /// Rerun SREA on every contingent execution.
    Drea,
    /// `Drea`, but a contingent observation only reschedules when the
    /// observed time fell outside the guide's predicted window.
    DreaS,
    /// Reschedules on every contingent observation; sends only when the
    /// resulting risk-level shift clears `si_threshold`.
    DreaSi,
    /// `DreaSi`, gating sends on the absolute change in risk level instead
    /// of the geometric send-probability gap.
    DreaAlp,
    /// Reschedules once contingent observations since the last reschedule
    /// clear an `ar_threshold`-derived bound.
    DreaAr,
    /// `DreaAr` with a multiplicative success factor standing in for the
    /// fixed observation count.
    DreaAra,
    /// `DreaAr`'s reschedule gate, with sends additionally gated on
    /// `si_threshold`.
    Arsi,
    /// Alias for `Arsi` — the reference implementation exposes the same
    /// decision rule under both names.
    Arsc,
    /// Decoupled multi-agent dispatch via the Wilson synchrony-flexibility LP.
    Da,
    /// Decoupled multi-agent dispatch reusing a whole-network SREA envelope.
    DaSrea,
}

impl From<StrategyArg> for DispatchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Early => Self::Single(ExecutionStrategy::Early),
            StrategyArg::Srea => Self::Single(ExecutionStrategy::Srea),
            StrategyArg::Drea => Self::Single(ExecutionStrategy::Drea),
            StrategyArg::DreaS => Self::Single(ExecutionStrategy::DreaS),
            StrategyArg::DreaSi => Self::Single(ExecutionStrategy::DreaSi),
            StrategyArg::DreaAlp => Self::Single(ExecutionStrategy::DreaAlp),
            StrategyArg::DreaAr => Self::Single(ExecutionStrategy::DreaAr),
            StrategyArg::DreaAra => Self::Single(ExecutionStrategy::DreaAra),
            StrategyArg::Arsi => Self::Single(ExecutionStrategy::Arsi),
            StrategyArg::Arsc => Self::Single(ExecutionStrategy::Arsc),
            StrategyArg::Da => Self::Decoupled(DecoupleStrategy::OptInter),
            StrategyArg::DaSrea => Self::Decoupled(DecoupleStrategy::Srea),
        }
    }
}

/// Errors surfaced while executing the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// The assembled configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Recursing into an input path failed.
    #[error("failed to walk `{path}`: {source}")]
    Walk {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying directory-walk error.
        #[source]
        source: walkdir::Error,
    },
    /// Running the configured simulation batch failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Expands `paths` into a flat list of files, recursing into directories and
/// keeping only paths whose extension is `json`.
///
/// # Errors
/// Returns [`CliError::Walk`] if recursing into a directory fails.
pub fn expand_input_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut expanded = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|source| CliError::Walk {
                    path: path.clone(),
                    source,
                })?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "json")
                {
                    expanded.push(entry.path().to_path_buf());
                }
            }
        } else {
            expanded.push(path.clone());
        }
    }
    Ok(expanded)
}

/// Assembles a validated [`SimulationConfig`] from parsed CLI arguments.
///
/// # Errors
/// Returns [`CliError`] if directory recursion fails or the assembled
/// configuration is invalid.
pub fn build_config(cli: &Cli) -> Result<SimulationConfig, CliError> {
    let inputs = expand_input_paths(&cli.paths)?;
    let threads = cli
        .threads
        .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get));

    SimulationConfigBuilder::new()
        .with_threads(threads)
        .with_samples(cli.samples)
        .with_strategy(cli.execution.into())
        .with_ar_threshold(cli.ar_threshold)
        .with_si_threshold(cli.si_threshold)
        .with_seed(cli.seed)
        .with_output(cli.output.clone())
        .with_live_progress(!cli.no_live)
        .with_inputs(inputs)
        .build()
        .map_err(CliError::from)
}

/// Runs the CLI end to end: builds the configuration and drives the worker
/// pool over every discovered network.
///
/// # Errors
/// Returns [`CliError`] if configuration assembly or execution fails.
pub fn run_cli(cli: &Cli) -> Result<Vec<RunSummary>, CliError> {
    let config = build_config(cli)?;
    crate::driver::run(&config).map_err(CliError::from)
}

/// Renders a batch's results as a plain-text table.
///
/// # Errors
/// Returns [`io::Error`] if writing to `writer` fails.
pub fn render_summary(summaries: &[RunSummary], mut writer: impl Write) -> io::Result<()> {
    for summary in summaries {
        writeln!(writer, "{}\t{:.4}", summary.stn_path(), summary.robustness())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_arg_maps_da_to_opt_inter_decoupling() {
        let strategy: DispatchStrategy = StrategyArg::Da.into();
        assert_eq!(strategy, DispatchStrategy::Decoupled(DecoupleStrategy::OptInter));
    }

    #[test]
    fn strategy_arg_maps_early_to_the_early_policy() {
        let strategy: DispatchStrategy = StrategyArg::Early.into();
        assert_eq!(strategy, DispatchStrategy::Single(ExecutionStrategy::Early));
    }
}
