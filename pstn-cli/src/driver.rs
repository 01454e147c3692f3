//! Worker-pool driver that fans a batch of dispatch simulations out across a
//! `rayon` thread pool and appends one aggregate CSV row per named network.
//!
//! Ported from `run_simulator.py::across_paths`/`multiple_simulations`: each
//! sample is an independent unit of work with its own private `Stn` clone and
//! seeded RNG, no shared mutable state crosses sample boundaries, and the
//! thread pool is rebuilt with a fixed backoff on transient build failure
//! (mirroring the reference driver's retry loop around `multiprocessing.Pool`).

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use pstn_core::{DecoupleStrategy, EdgeKind, ExecutionStrategy};
use pstn_core::{DecoupledSimulator, Distribution, SimulationOutcome, Simulator, Stn, StnError};

use crate::config::{DispatchStrategy, SimulationConfig};

const THREAD_POOL_BUILD_ATTEMPTS: u32 = 3;
const THREAD_POOL_BUILD_BACKOFF: Duration = Duration::from_secs(3);

/// Errors raised while driving a batch of simulations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DriverError {
    /// Reading an input path failed.
    #[error("failed to read `{path}`: {source}")]
    Read {
        /// The path that failed to read.
        path: std::path::PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Parsing a PSTN document failed.
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        /// The path that failed to parse.
        path: std::path::PathBuf,
        /// Underlying parse failure.
        #[source]
        source: pstn_core::io::json::LoadError,
    },
    /// Propagation or assignment raised a network error.
    #[error(transparent)]
    Stn(#[from] StnError),
    /// The thread pool could not be built after retrying.
    #[error("failed to build the worker pool after {attempts} attempts: {source}")]
    ThreadPool {
        /// Number of attempts made.
        attempts: u32,
        /// Underlying build failure.
        #[source]
        source: rayon::ThreadPoolBuildError,
    },
    /// Writing a CSV row failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Opening or flushing the CSV output file failed.
    #[error("failed to write `{path}`: {source}")]
    Write {
        /// The path that failed to write.
        path: std::path::PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// One aggregate CSV row's worth of results for a single named network.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    execution: String,
    robustness: f64,
    threads: usize,
    random_seed: u64,
    runtime: f64,
    samples: u64,
    timestamp: u64,
    stn_path: String,
    ar_threshold: f64,
    si_threshold: f64,
    synchronous_density: f64,
    sd_avg: f64,
    vert_count: usize,
    contingent_density: f64,
    reschedule_freq: f64,
    send_freq: f64,
}

impl RunSummary {
    /// Returns the network's source path, as recorded in the row.
    #[must_use]
    pub fn stn_path(&self) -> &str {
        &self.stn_path
    }

    /// Returns the achieved robustness (`successes / samples`).
    #[rustfmt::skip]
    #[must_use]
    pub const fn robustness(&self) -> f64 { self.robustness }
}

/// Runs every configured input through the configured dispatch strategy,
/// appending one row per named network to the configured CSV output (if
/// any), and returns one [`RunSummary`] per named network in input order.
///
/// # Errors
/// Returns [`DriverError`] if an input cannot be read or parsed, the thread
/// pool cannot be built, dispatch raises a network error, or writing the CSV
/// output fails.
#[instrument(name = "driver.run", skip(config))]
pub fn run(config: &SimulationConfig) -> Result<Vec<RunSummary>, DriverError> {
    let base_seed = config
        .seed()
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..=u64::MAX));
    info!(base_seed, "starting batch with base seed");

    let pool = build_thread_pool(config.threads().get())?;
    let mut summaries = Vec::new();

    for path in config.inputs() {
        let bytes = std::fs::read(path).map_err(|source| DriverError::Read {
            path: path.clone(),
            source,
        })?;
        let instances = pstn_core::io::json::load(&bytes).map_err(|source| DriverError::Parse {
            path: path.clone(),
            source,
        })?;

        for (name, stn) in instances {
            let display_path = format!("{}::{name}", path.display());
            let summary = run_one_network(&pool, &display_path, &stn, config, base_seed)?;

            if let Some(output) = config.output() {
                append_csv_row(output, &summary)?;
            }
            if config.live_progress() {
                print_summary(&summary, summaries.len() + 1);
            }
            summaries.push(summary);
        }
    }

    Ok(summaries)
}

fn build_thread_pool(threads: usize) -> Result<rayon::ThreadPool, DriverError> {
    for attempt in 1..THREAD_POOL_BUILD_ATTEMPTS {
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => return Ok(pool),
            Err(source) => {
                warn!(attempt, %source, "failed to build thread pool; retrying");
                std::thread::sleep(THREAD_POOL_BUILD_BACKOFF);
            }
        }
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|source| DriverError::ThreadPool {
            attempts: THREAD_POOL_BUILD_ATTEMPTS,
            source,
        })
}

#[expect(
    clippy::cast_precision_loss,
    reason = "sample/success counts fit comfortably below f64's exact-integer range"
)]
fn run_one_network(
    pool: &rayon::ThreadPool,
    display_path: &str,
    stn: &Stn,
    config: &SimulationConfig,
    base_seed: u64,
) -> Result<RunSummary, DriverError> {
    let samples = config.samples();
    let mut seed_rng = SmallRng::seed_from_u64(base_seed);
    let seeds: Vec<u64> = (0..samples).map(|_| seed_rng.gen_range(0..=u64::MAX)).collect();

    let start = SystemTime::now();
    let outcomes: Vec<StnOutcome> = pool.install(|| {
        seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = SmallRng::seed_from_u64(seed);
                dispatch_one_sample(stn, config, &mut rng)
            })
            .collect()
    });
    let runtime = start.elapsed().unwrap_or_default().as_secs_f64();

    let mut outcomes_ok = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        outcomes_ok.push(outcome?);
    }

    let successes = outcomes_ok.iter().filter(|outcome| outcome.success).count();
    let total_reschedules: u64 = outcomes_ok.iter().map(|outcome| u64::from(outcome.reschedules)).sum();
    let total_sends: u64 = outcomes_ok.iter().map(|outcome| u64::from(outcome.sends)).sum();

    let stats = NetworkStats::from_stn(stn);
    let options = config.options();

    Ok(RunSummary {
        execution: strategy_label(config.strategy()),
        robustness: successes as f64 / samples as f64,
        threads: config.threads().get(),
        random_seed: base_seed,
        runtime,
        samples,
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        stn_path: display_path.to_owned(),
        ar_threshold: options.ar_threshold,
        si_threshold: options.si_threshold,
        synchronous_density: stats.synchronous_density,
        sd_avg: stats.sd_avg,
        vert_count: stats.vert_count,
        contingent_density: stats.contingent_density,
        reschedule_freq: total_reschedules as f64 / samples as f64,
        send_freq: total_sends as f64 / samples as f64,
    })
}

type StnOutcome = Result<SimulationOutcome, StnError>;

fn dispatch_one_sample(stn: &Stn, config: &SimulationConfig, rng: &mut impl Rng) -> StnOutcome {
    match config.strategy() {
        DispatchStrategy::Single(strategy) => {
            Simulator::new(config.options()).simulate(stn, strategy, rng)
        }
        DispatchStrategy::Decoupled(strategy) => DecoupledSimulator::new().simulate(stn, strategy, rng),
    }
}

fn strategy_label(strategy: DispatchStrategy) -> String {
    match strategy {
        DispatchStrategy::Single(ExecutionStrategy::Early) => "early",
        DispatchStrategy::Single(ExecutionStrategy::Srea) => "srea",
        DispatchStrategy::Single(ExecutionStrategy::Drea) => "drea",
        DispatchStrategy::Single(ExecutionStrategy::DreaS) => "drea-s",
        DispatchStrategy::Single(ExecutionStrategy::DreaSi) => "drea-si",
        DispatchStrategy::Single(ExecutionStrategy::DreaAlp) => "drea-alp",
        DispatchStrategy::Single(ExecutionStrategy::DreaAr) => "drea-ar",
        DispatchStrategy::Single(ExecutionStrategy::DreaAra) => "drea-ara",
        DispatchStrategy::Single(ExecutionStrategy::Arsi) => "arsi",
        DispatchStrategy::Single(ExecutionStrategy::Arsc) => "arsc",
        DispatchStrategy::Decoupled(DecoupleStrategy::OptInter) => "da",
        DispatchStrategy::Decoupled(DecoupleStrategy::Srea) => "da-srea",
    }
    .to_owned()
}

struct NetworkStats {
    vert_count: usize,
    contingent_density: f64,
    synchronous_density: f64,
    sd_avg: f64,
}

impl NetworkStats {
    #[expect(
        clippy::cast_precision_loss,
        reason = "vertex/edge counts fit comfortably below f64's exact-integer range"
    )]
    fn from_stn(stn: &Stn) -> Self {
        let vert_count = stn.vertices().count();
        let total_edges = stn.edges().count();
        let contingent_count = stn.edges().filter(|edge| edge.is_contingent()).count();
        let interagent_count = stn.edges().filter(|edge| edge.is_interagent()).count();

        let gaussian_std_devs: Vec<f64> = stn
            .edges()
            .filter_map(|edge| match edge.kind() {
                EdgeKind::Contingent {
                    distribution: Distribution::Gaussian { std_dev_ms, .. },
                } => Some(*std_dev_ms),
                _ => None,
            })
            .collect();
        let sd_avg = if gaussian_std_devs.is_empty() {
            0.0
        } else {
            gaussian_std_devs.iter().sum::<f64>() / gaussian_std_devs.len() as f64
        };

        let divide = |numerator: usize| {
            if total_edges == 0 {
                0.0
            } else {
                numerator as f64 / total_edges as f64
            }
        };

        Self {
            vert_count,
            contingent_density: divide(contingent_count),
            synchronous_density: divide(interagent_count),
            sd_avg,
        }
    }
}

fn append_csv_row(path: &Path, summary: &RunSummary) -> Result<(), DriverError> {
    static WRITE_LOCK: Mutex<()> = Mutex::new(());
    let _guard = WRITE_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

    let write_header = !path.exists();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| DriverError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(write_header)
        .from_writer(file);
    writer.serialize(summary)?;
    writer.flush().map_err(|source| DriverError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn print_summary(summary: &RunSummary, index: usize) {
    println!("{}", "-".repeat(79));
    println!("    Ran on: {}", summary.stn_path);
    println!("    Samples: {}", summary.samples);
    println!("    Threads: {}", summary.threads);
    println!("    Execution: {}", summary.execution);
    println!("    AR Threshold: {}", summary.ar_threshold);
    println!("    SI Threshold: {}", summary.si_threshold);
    println!("    Robustness: {}", summary.robustness);
    println!("    Seed: {}", summary.random_seed);
    println!("    Runtime: {}", summary.runtime);
    println!("    Vert Count: {}", summary.vert_count);
    println!("    Cont Edge Dens: {}", summary.contingent_density);
    println!("    Cont SD Avg: {}", summary.sd_avg);
    println!("    Sync Density: {}", summary.synchronous_density);
    println!("    Resc Freq: {}", summary.reschedule_freq);
    println!("    Send Freq: {}", summary.send_freq);
    println!("    Total Progress: {index}");
    println!("{}", "-".repeat(79));
}
