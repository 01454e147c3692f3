//! Multi-agent dispatch simulation over decoupled per-agent sub-networks.
//!
//! Ported from `libheat/dmontsim.py`. Every agent's sub-STN is advanced in
//! lockstep: each tick, every agent computes its own DREA guide and
//! candidate next timepoint, and the globally earliest candidate wins —
//! every agent's bookkeeping is then updated from that single winner, not
//! from its own local candidate.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::decoupling::{DecoupleStrategy, opt_decouple, srea_decouple};
use crate::error::StnResult;
use crate::ids::AgentId;
use crate::srea;
use crate::stn::Stn;

use super::simulator::{SelectedTimepoint, SimulationOutcome, select_next_timepoint};

/// Precision of the Wilson LP binary search used when decoupling with
/// [`DecoupleStrategy::OptInter`].
const DECOUPLE_FIDELITY: f64 = 0.005;

#[derive(Debug, Clone, Copy)]
struct AgentOptions {
    first_run: bool,
    executed_contingent: bool,
    executed_time: f64,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            first_run: true,
            executed_contingent: false,
            executed_time: 0.0,
        }
    }
}

/// Drives every agent's decoupled sub-STN in lockstep under the DREA guide
/// policy.
#[derive(Debug, Default)]
pub struct DecoupledSimulator;

impl DecoupledSimulator {
    /// Builds a decoupled simulator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs the decoupled simulation to completion.
    ///
    /// Resamples the whole network once, attempts to decouple it via
    /// `strategy`, and falls back to each agent's own live sub-STN if
    /// decoupling fails. Returns `true` if the joined network stays
    /// consistent throughout and at the final assignment check.
    ///
    /// # Errors
    /// Propagates any [`StnError`](crate::error::StnError) raised while
    /// resampling, assigning, or propagating.
    #[instrument(name = "dispatch.decoupled_simulate", skip(self, starting_stn, rng), fields(strategy = ?strategy))]
    pub fn simulate(
        &self,
        starting_stn: &Stn,
        strategy: DecoupleStrategy,
        rng: &mut impl Rng,
    ) -> StnResult<SimulationOutcome> {
        let mut joined = starting_stn.clone();
        joined.resample_contingent_edges(rng)?;
        if !joined.floyd_warshall()? {
            debug!("resampled network is inconsistent before decoupling");
            return Ok(SimulationOutcome {
                success: false,
                reschedules: 0,
                sends: 0,
            });
        }

        let outcome = match strategy {
            DecoupleStrategy::OptInter => opt_decouple(&joined, DECOUPLE_FIDELITY)?,
            DecoupleStrategy::Srea => srea_decouple(&joined)?,
        };

        let mut live: BTreeMap<AgentId, Stn> = match outcome.subproblems {
            Some(subproblems) => subproblems.into_iter().collect(),
            None => {
                debug!("decoupling failed; falling back to live per-agent sub-networks");
                joined
                    .agents()
                    .map(|agent| (agent, joined.get_sub_stn(agent)))
                    .collect()
            }
        };

        let mut options: BTreeMap<AgentId, AgentOptions> =
            live.keys().map(|&agent| (agent, AgentOptions::default())).collect();
        let mut assignment_stn = joined.clone();
        let mut reschedules = 0_u32;
        let mut sends = 0_u32;

        loop {
            let any_unassigned = live
                .values()
                .any(|sub| sub.vertices().any(|vertex| !vertex.is_executed()));
            if !any_unassigned {
                break;
            }

            let mut best: Option<(AgentId, SelectedTimepoint)> = None;
            for (&agent, sub) in &live {
                let agent_options = options[&agent];
                let rerun = agent_options.first_run || agent_options.executed_contingent;
                let (guide, sent) = drea_guide(sub, rerun)?;
                if rerun {
                    reschedules += 1;
                    if sent {
                        sends += 1;
                    }
                }
                if let Some(candidate) = select_next_timepoint(&guide, agent_options.executed_time) {
                    let is_better = match &best {
                        None => true,
                        Some((_, current)) => {
                            candidate.time < current.time
                                || (candidate.time == current.time
                                    && candidate.vertex.get() < current.vertex.get())
                        }
                    };
                    if is_better {
                        best = Some((agent, candidate));
                    }
                }
            }

            let Some((winner_agent, winner)) = best else {
                debug!("no agent has a reachable timepoint; ending simulation early");
                break;
            };

            for agent_options in options.values_mut() {
                agent_options.first_run = false;
                agent_options.executed_contingent = winner.incoming_contingent;
                agent_options.executed_time = winner.time;
            }

            if let Some(sub) = live.get_mut(&winner_agent) {
                sub.assign_timepoint(winner.vertex, winner.time)?;
                if !sub.floyd_warshall()? {
                    if joined.is_consistent() {
                        warn!(
                            agent = winner_agent.get(),
                            "sub-network became inconsistent while the joined network remained consistent"
                        );
                    }
                    return Ok(SimulationOutcome {
                        success: false,
                        reschedules,
                        sends,
                    });
                }
                sub.remove_old_timepoints();
            }

            joined.assign_timepoint(winner.vertex, winner.time)?;
            assignment_stn.assign_timepoint(winner.vertex, winner.time)?;
            if !joined.floyd_warshall()? {
                debug!("joined network became inconsistent during dispatch");
                return Ok(SimulationOutcome {
                    success: false,
                    reschedules,
                    sends,
                });
            }
            joined.remove_old_timepoints();
        }

        let consistent = assignment_stn.floyd_warshall()?;
        if !consistent {
            debug!("final joined assignment check failed");
        }
        Ok(SimulationOutcome {
            success: consistent,
            reschedules,
            sends,
        })
    }
}

/// Returns the DREA guide for one agent's sub-network, and whether SREA
/// actually produced a feasible envelope when `rerun` requested a fresh
/// solve.
fn drea_guide(sub: &Stn, rerun: bool) -> StnResult<(Stn, bool)> {
    if rerun {
        match srea::srea(sub)? {
            Some(outcome) => Ok((outcome.envelope, true)),
            None => Ok((sub.clone(), false)),
        }
    } else {
        Ok((sub.clone(), false))
    }
}
