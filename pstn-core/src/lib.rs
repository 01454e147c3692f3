//! PSTN dynamic execution engine.
//!
//! Models Probabilistic Simple Temporal Networks, propagates them with
//! Floyd-Warshall, computes robust envelopes via SREA, decouples networks
//! into per-agent sub-problems, and simulates dispatch under a family of
//! reschedule policies.

mod decoupling;
mod dispatch;
mod distribution;
mod error;
mod ids;
pub mod io;
mod lp;
mod metrics;
mod srea;
mod stn;

pub use crate::decoupling::{DecoupleOutcome, DecoupleStrategy, opt_decouple, srea_decouple};
pub use crate::dispatch::decoupled::DecoupledSimulator;
pub use crate::dispatch::simulator::{
    ExecutionStrategy, SelectedTimepoint, SimulationOptions, SimulationOutcome, Simulator,
};
pub use crate::distribution::{Distribution, DistributionError};
pub use crate::error::{StnError, StnErrorCode, StnResult};
pub use crate::ids::{AgentId, VertexId};
pub use crate::lp::LpError;
pub use crate::metrics::SampleOutcome;
pub use crate::srea::{SreaOutcome, srea};
pub use crate::stn::{Edge, EdgeKind, Stn, Vertex};
