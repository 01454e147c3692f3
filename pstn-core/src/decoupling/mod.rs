//! Splitting a whole-network schedule into independent per-agent
//! sub-networks.
//!
//! Two strategies are available, both ported from `libheat/decoupling/`:
//! [`opt_decouple`] (Wilson's synchrony-flexibility LP) and [`srea_decouple`]
//! (reusing a whole-network SREA envelope).

mod opt_decouple_impl;
mod srea_decouple_impl;

pub use opt_decouple_impl::opt_decouple;
pub use srea_decouple_impl::srea_decouple;

use crate::ids::AgentId;
use crate::stn::Stn;

/// Which decoupling strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoupleStrategy {
    /// Maximise synchrony-point flexibility via a single Wilson LP.
    OptInter,
    /// Reuse a whole-network SREA envelope.
    Srea,
}

/// The result of attempting to decouple a network.
#[derive(Debug, Clone)]
pub struct DecoupleOutcome {
    /// The achieved robustness/flexibility level. `0.0` if decoupling failed.
    pub alpha: f64,
    /// One sub-network per agent, in ascending [`AgentId`] order, or `None`
    /// if the network could not be decoupled.
    pub subproblems: Option<Vec<(AgentId, Stn)>>,
}
