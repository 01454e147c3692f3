//! Validating builder for assembling a simulation run's configuration from
//! parsed CLI arguments.
//!
//! Follows the same pattern as the core library's validating builder:
//! `#[must_use]` setters on a plain struct, with `build()` turning invalid
//! combinations into a `ConfigError` rather than panicking.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use pstn_core::{DecoupleStrategy, ExecutionStrategy, SimulationOptions};
use thiserror::Error;

/// Which family of dispatch simulation to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchStrategy {
    /// A single-agent simulation under one of the ten reschedule policies.
    Single(ExecutionStrategy),
    /// A decoupled multi-agent simulation under the given decoupling
    /// strategy.
    Decoupled(DecoupleStrategy),
}

/// Errors raised while validating a [`SimulationConfigBuilder`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The requested sample count was zero.
    #[error("sample count must be at least 1 (got {got})")]
    ZeroSamples {
        /// The rejected sample count.
        got: u64,
    },
    /// The requested thread count was zero.
    #[error("thread count must be at least 1 (got {got})")]
    ZeroThreads {
        /// The rejected thread count.
        got: usize,
    },
    /// The AR threshold was negative.
    #[error("ar threshold must be non-negative (got {got})")]
    NegativeArThreshold {
        /// The rejected threshold.
        got: f64,
    },
    /// The SI threshold was negative.
    #[error("si threshold must be non-negative (got {got})")]
    NegativeSiThreshold {
        /// The rejected threshold.
        got: f64,
    },
    /// The output path has no parent directory to write into.
    #[error("output path `{path}` has no parent directory")]
    NoParentDirectory {
        /// The rejected output path.
        path: PathBuf,
    },
    /// No input paths were supplied.
    #[error("at least one PSTN JSON path or directory must be supplied")]
    NoInputPaths,
}

/// Fully validated configuration for a batch of simulation runs.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    threads: NonZeroUsize,
    samples: u64,
    strategy: DispatchStrategy,
    options: SimulationOptions,
    seed: Option<u64>,
    output: Option<PathBuf>,
    live_progress: bool,
    inputs: Vec<PathBuf>,
}

impl SimulationConfig {
    /// Returns the configured worker thread count.
    #[rustfmt::skip]
    #[must_use]
    pub const fn threads(&self) -> NonZeroUsize { self.threads }

    /// Returns the configured number of samples per STN.
    #[rustfmt::skip]
    #[must_use]
    pub const fn samples(&self) -> u64 { self.samples }

    /// Returns the configured dispatch strategy.
    #[rustfmt::skip]
    #[must_use]
    pub const fn strategy(&self) -> DispatchStrategy { self.strategy }

    /// Returns the configured policy thresholds.
    #[rustfmt::skip]
    #[must_use]
    pub const fn options(&self) -> SimulationOptions { self.options }

    /// Returns the configured base seed, if any.
    #[rustfmt::skip]
    #[must_use]
    pub const fn seed(&self) -> Option<u64> { self.seed }

    /// Returns the configured CSV output path, if any.
    #[must_use]
    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }

    /// Returns whether live progress reporting is enabled.
    #[rustfmt::skip]
    #[must_use]
    pub const fn live_progress(&self) -> bool { self.live_progress }

    /// Returns the configured input paths (files or directories).
    #[must_use]
    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }
}

/// Builds a [`SimulationConfig`], validating on [`Self::build`].
///
/// # Examples
/// ```
/// use pstn_cli::config::SimulationConfigBuilder;
///
/// let config = SimulationConfigBuilder::new()
///     .with_samples(10)
///     .with_inputs(vec!["network.json".into()])
///     .build()
///     .expect("configuration is valid");
/// assert_eq!(config.samples(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct SimulationConfigBuilder {
    threads: usize,
    samples: u64,
    strategy: DispatchStrategy,
    ar_threshold: f64,
    si_threshold: f64,
    seed: Option<u64>,
    output: Option<PathBuf>,
    live_progress: bool,
    inputs: Vec<PathBuf>,
}

impl Default for SimulationConfigBuilder {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            samples: 100,
            strategy: DispatchStrategy::Single(ExecutionStrategy::Early),
            ar_threshold: 0.0,
            si_threshold: 0.0,
            seed: None,
            output: None,
            live_progress: true,
            inputs: Vec::new(),
        }
    }
}

impl SimulationConfigBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the worker thread count.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Overrides the number of samples per STN.
    #[must_use]
    pub const fn with_samples(mut self, samples: u64) -> Self {
        self.samples = samples;
        self
    }

    /// Overrides the dispatch strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Overrides the AR-phase threshold.
    #[must_use]
    pub const fn with_ar_threshold(mut self, ar_threshold: f64) -> Self {
        self.ar_threshold = ar_threshold;
        self
    }

    /// Overrides the SI/SC/ALP threshold.
    #[must_use]
    pub const fn with_si_threshold(mut self, si_threshold: f64) -> Self {
        self.si_threshold = si_threshold;
        self
    }

    /// Overrides the base RNG seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Overrides the CSV output path.
    #[must_use]
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Overrides whether live progress reporting is enabled.
    #[must_use]
    pub const fn with_live_progress(mut self, live_progress: bool) -> Self {
        self.live_progress = live_progress;
        self
    }

    /// Overrides the input paths (files or directories to recurse into).
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<PathBuf>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Validates the configuration and constructs a [`SimulationConfig`].
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the sample count or thread count is zero,
    /// either threshold is negative, the output path has no parent
    /// directory, or no input paths were supplied.
    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let threads =
            NonZeroUsize::new(self.threads).ok_or(ConfigError::ZeroThreads { got: self.threads })?;

        if self.samples == 0 {
            return Err(ConfigError::ZeroSamples { got: self.samples });
        }
        if self.ar_threshold < 0.0 {
            return Err(ConfigError::NegativeArThreshold {
                got: self.ar_threshold,
            });
        }
        if self.si_threshold < 0.0 {
            return Err(ConfigError::NegativeSiThreshold {
                got: self.si_threshold,
            });
        }
        if let Some(output) = &self.output {
            if output.parent().is_none() {
                return Err(ConfigError::NoParentDirectory {
                    path: output.clone(),
                });
            }
        }
        if self.inputs.is_empty() {
            return Err(ConfigError::NoInputPaths);
        }

        Ok(SimulationConfig {
            threads,
            samples: self.samples,
            strategy: self.strategy,
            options: SimulationOptions {
                ar_threshold: self.ar_threshold,
                si_threshold: self.si_threshold,
            },
            seed: self.seed,
            output: self.output,
            live_progress: self.live_progress,
            inputs: self.inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_samples() {
        let err = SimulationConfigBuilder::new()
            .with_samples(0)
            .with_inputs(vec!["network.json".into()])
            .build()
            .expect_err("zero samples is invalid");
        assert!(matches!(err, ConfigError::ZeroSamples { got: 0 }));
    }

    #[test]
    fn rejects_missing_inputs() {
        let err = SimulationConfigBuilder::new()
            .build()
            .expect_err("no inputs is invalid");
        assert!(matches!(err, ConfigError::NoInputPaths));
    }

    #[test]
    fn rejects_negative_thresholds() {
        let err = SimulationConfigBuilder::new()
            .with_inputs(vec!["network.json".into()])
            .with_ar_threshold(-1.0)
            .build()
            .expect_err("negative threshold is invalid");
        assert!(matches!(err, ConfigError::NegativeArThreshold { .. }));
    }

    #[test]
    fn accepts_a_valid_configuration() {
        let config = SimulationConfigBuilder::new()
            .with_samples(10)
            .with_inputs(vec!["network.json".into()])
            .build()
            .expect("configuration is valid");
        assert_eq!(config.samples(), 10);
        assert_eq!(config.inputs().len(), 1);
    }
}
