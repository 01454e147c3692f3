//! Single-agent dispatch simulation under a family of reschedule policies.
//!
//! Ported from `libheat/montsim.py`. A [`Simulator`] drives one STN through
//! dispatch: resample contingent edges once, then repeatedly pick the
//! earliest not-yet-executed timepoint off a policy-chosen *guide* STN,
//! assign it, propagate, and garbage-collect resolved history.

use rand::Rng;
use tracing::{debug, instrument};

use crate::error::StnResult;
use crate::ids::VertexId;
use crate::srea::{self, SreaOutcome};
use crate::stn::Stn;

/// Which reschedule policy governs how often the guide STN is recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Dispatch as soon as possible; the guide is always the live STN.
    Early,
    /// Solve SREA once, on the first call, and reuse that guide forever.
    Srea,
    /// Rerun SREA whenever it's the first call or a contingent edge just
    /// executed.
    Drea,
    /// As [`Self::Drea`], but a contingent observation only reschedules when
    /// the observed time fell outside the guide's predicted window for that
    /// vertex.
    DreaS,
    /// Reschedules on every contingent observation to obtain a candidate
    /// risk level, but only adopts (sends) it when the resulting change in
    /// send-probability clears `si_threshold`.
    DreaSi,
    /// As [`Self::DreaSi`], gating the send on `|α' − prev_α|` instead of
    /// the geometric send-probability gap.
    DreaAlp,
    /// Reschedules once the count of contingent observations since the last
    /// reschedule clears an `ar_threshold`-derived bound.
    DreaAr,
    /// As [`Self::DreaAr`], replacing the fixed observation count with a
    /// multiplicative success factor seeded at `1.0`.
    DreaAra,
    /// [`Self::DreaAr`]'s reschedule gate, with the result additionally
    /// gated on `si_threshold` before being sent. The reference
    /// implementation exposes this identical rule under both `arsi` and
    /// `arsc`; [`Self::Arsc`] is kept as a distinct variant purely to
    /// preserve that CLI surface.
    Arsi,
    /// Identical decision rule to [`Self::Arsi`] — see its documentation.
    Arsc,
}

/// Tunable thresholds shared by the accumulation-based policies, matching
/// the `--ar-threshold`/`--si-threshold` CLI flags (both floating-point,
/// defaulting to `0.0`, which disables throttling so every opportunity
/// reschedules).
#[derive(Debug, Clone, Copy)]
pub struct SimulationOptions {
    /// Calls between forced reschedules under the `Ar`-family policies.
    pub ar_threshold: f64,
    /// Risk-level-shift threshold gating sends under `DreaSi`, `DreaAlp`,
    /// `Arsi` and `Arsc`.
    pub si_threshold: f64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            ar_threshold: 0.0,
            si_threshold: 0.0,
        }
    }
}

/// The vertex [`select_next_timepoint`] chose to dispatch next.
#[derive(Debug, Clone, Copy)]
pub struct SelectedTimepoint {
    /// The chosen vertex.
    pub vertex: VertexId,
    /// Its resolved distance from Z.
    pub time: f64,
    /// Whether the chosen vertex is the uncontrollable end of a contingent
    /// edge.
    pub incoming_contingent: bool,
}

/// The result of driving a network through dispatch to completion.
#[derive(Debug, Clone, Copy)]
pub struct SimulationOutcome {
    /// Whether the schedule stayed consistent throughout and at the final
    /// assignment check.
    pub success: bool,
    /// Number of times a guide-recomputing policy reran SREA.
    pub reschedules: u32,
    /// Number of reruns whose envelope was actually adopted as the guide.
    pub sends: u32,
}

/// The largest k the AR reschedule-bound search considers, matching the
/// reference implementation's own search cap.
const AR_SEARCH_CAP: u32 = 100;

#[derive(Debug, Clone)]
struct PolicyState {
    previous_alpha: f64,
    previous_guide: Option<Stn>,
    /// Contingent observations since the last AR-family reschedule.
    ar_counter: u32,
    /// ARA's multiplicative success factor.
    factor: f64,
    /// The guide's predicted `[guide_min, guide_max]` window for the vertex
    /// executed most recently, and the time it was actually executed at.
    guide_min: f64,
    guide_max: f64,
    executed_time: f64,
    reschedules: u32,
    sends: u32,
}

impl Default for PolicyState {
    fn default() -> Self {
        Self {
            previous_alpha: 0.0,
            previous_guide: None,
            ar_counter: 0,
            factor: 1.0,
            guide_min: 0.0,
            guide_max: 0.0,
            executed_time: 0.0,
            reschedules: 0,
            sends: 0,
        }
    }
}

/// Returns the count of contingent edges whose child vertex has not yet
/// executed in `stn`.
fn remaining_contingent_count(stn: &Stn) -> usize {
    stn.edges()
        .filter(|edge| edge.is_contingent())
        .filter(|edge| !stn.vertex(edge.target()).is_some_and(|vertex| vertex.is_executed()))
        .count()
}

/// Returns the largest `k` (capped at [`AR_SEARCH_CAP`]) for which
/// `(1 - previous_alpha)^(k+1) > threshold`. A non-positive threshold
/// disables the bound entirely (treated as `k = ∞`, so the search cap
/// applies directly).
fn ar_reschedule_bound(previous_alpha: f64, threshold: f64) -> u32 {
    if threshold <= 0.0 {
        return AR_SEARCH_CAP;
    }
    let mut k = 0_u32;
    while k < AR_SEARCH_CAP && (1.0 - previous_alpha).powf(f64::from(k + 1)) > threshold {
        k += 1;
    }
    k
}

/// Drives a single agent's STN through dispatch under a chosen reschedule
/// policy.
#[derive(Debug, Default)]
pub struct Simulator {
    options: SimulationOptions,
}

impl Simulator {
    /// Builds a simulator with the given policy thresholds.
    #[must_use]
    pub const fn new(options: SimulationOptions) -> Self {
        Self { options }
    }

    /// Runs dispatch to completion, returning `true` if the schedule stayed
    /// consistent throughout and at the final assignment check.
    ///
    /// # Errors
    /// Propagates any [`StnError`](crate::error::StnError) raised while
    /// resampling, assigning, or propagating.
    #[instrument(name = "dispatch.simulate", skip(self, starting_stn, rng), fields(strategy = ?strategy))]
    pub fn simulate(
        &self,
        starting_stn: &Stn,
        strategy: ExecutionStrategy,
        rng: &mut impl Rng,
    ) -> StnResult<SimulationOutcome> {
        let mut live = starting_stn.clone();
        live.resample_contingent_edges(rng)?;
        if !live.floyd_warshall()? {
            debug!("resampled network is inconsistent before dispatch");
            return Ok(SimulationOutcome {
                success: false,
                reschedules: 0,
                sends: 0,
            });
        }
        let mut assignment_stn = live.clone();

        let mut state = PolicyState::default();
        let mut first_run = true;
        let mut executed_contingent = false;
        let mut current_time = 0.0_f64;

        loop {
            if live.vertices().all(|vertex| vertex.is_executed()) {
                break;
            }

            let (alpha, guide) = self.get_guide(strategy, &live, &mut state, first_run, executed_contingent)?;
            state.previous_alpha = alpha;
            state.previous_guide = Some(guide.clone());
            first_run = false;

            let Some(selected) = select_next_timepoint(&guide, current_time) else {
                debug!("no reachable timepoint remains; ending simulation early");
                break;
            };

            executed_contingent = selected.incoming_contingent;
            current_time = selected.time;
            let (guide_min, guide_max) = guide.zero_bounds(selected.vertex);
            state.guide_min = guide_min;
            state.guide_max = guide_max;
            state.executed_time = selected.time;

            live.assign_timepoint(selected.vertex, selected.time)?;
            assignment_stn.assign_timepoint(selected.vertex, selected.time)?;

            if !live.floyd_warshall()? {
                debug!("live network became inconsistent during dispatch");
                return Ok(SimulationOutcome {
                    success: false,
                    reschedules: state.reschedules,
                    sends: state.sends,
                });
            }
            live.remove_old_timepoints();
        }

        let consistent = assignment_stn.floyd_warshall()?;
        if !consistent {
            debug!("final assignment check failed");
        }
        Ok(SimulationOutcome {
            success: consistent,
            reschedules: state.reschedules,
            sends: state.sends,
        })
    }

    fn get_guide(
        &self,
        strategy: ExecutionStrategy,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        match strategy {
            ExecutionStrategy::Early => Ok((0.0, stn.clone())),
            ExecutionStrategy::Srea => self.srea_once(stn, state, first_run),
            ExecutionStrategy::Drea => self.drea(stn, state, first_run, executed_contingent),
            ExecutionStrategy::DreaS => self.drea_s(stn, state, first_run, executed_contingent),
            ExecutionStrategy::DreaSi => self.drea_si(stn, state, first_run, executed_contingent),
            ExecutionStrategy::DreaAlp => self.drea_alp(stn, state, first_run, executed_contingent),
            ExecutionStrategy::DreaAr => self.drea_ar(stn, state, first_run, executed_contingent),
            ExecutionStrategy::DreaAra => self.drea_ara(stn, state, first_run, executed_contingent),
            ExecutionStrategy::Arsi | ExecutionStrategy::Arsc => {
                self.ar_send_policy(stn, state, first_run, executed_contingent)
            }
        }
    }

    /// Reruns SREA, incrementing the reschedule counter, without deciding
    /// whether the result should be adopted.
    fn run_srea(&self, stn: &Stn, state: &mut PolicyState) -> StnResult<Option<SreaOutcome>> {
        state.reschedules += 1;
        srea::srea(stn)
    }

    /// Reruns SREA and unconditionally adopts a feasible result as the new
    /// guide, matching the reference `srea_reschedule` helper.
    fn srea_reschedule(&self, stn: &Stn, state: &mut PolicyState) -> StnResult<(f64, Stn)> {
        match self.run_srea(stn, state)? {
            Some(outcome) => {
                state.sends += 1;
                Ok((outcome.alpha, outcome.envelope))
            }
            None => {
                tracing::warn!("srea found no feasible envelope; falling back to the previous guide");
                Ok(self.reuse_guide(stn, state))
            }
        }
    }

    fn reuse_guide(&self, stn: &Stn, state: &PolicyState) -> (f64, Stn) {
        (
            state.previous_alpha,
            state.previous_guide.clone().unwrap_or_else(|| stn.clone()),
        )
    }

    fn srea_once(&self, stn: &Stn, state: &mut PolicyState, first_run: bool) -> StnResult<(f64, Stn)> {
        if first_run {
            self.srea_reschedule(stn, state)
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    fn drea(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run || executed_contingent {
            self.srea_reschedule(stn, state)
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    fn drea_s(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            return self.srea_reschedule(stn, state);
        }
        if executed_contingent {
            let in_bounds = state.guide_min <= state.executed_time && state.executed_time <= state.guide_max;
            if !in_bounds {
                return self.srea_reschedule(stn, state);
            }
        }
        Ok(self.reuse_guide(stn, state))
    }

    fn drea_si(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            return self.srea_reschedule(stn, state);
        }
        if !executed_contingent {
            return Ok(self.reuse_guide(stn, state));
        }
        let previous_alpha = state.previous_alpha;
        let Some(outcome) = self.run_srea(stn, state)? else {
            return Ok(self.reuse_guide(stn, state));
        };
        let n = f64_from_count(remaining_contingent_count(&outcome.envelope));
        let p0 = (1.0 - previous_alpha).powf(n);
        let p1 = (1.0 - outcome.alpha).powf(n);
        if p1 - p0 > self.options.si_threshold {
            state.sends += 1;
            Ok((outcome.alpha, outcome.envelope))
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    fn drea_alp(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            return self.srea_reschedule(stn, state);
        }
        if !executed_contingent {
            return Ok(self.reuse_guide(stn, state));
        }
        let previous_alpha = state.previous_alpha;
        let Some(outcome) = self.run_srea(stn, state)? else {
            return Ok(self.reuse_guide(stn, state));
        };
        if (outcome.alpha - previous_alpha).abs() > self.options.si_threshold {
            state.sends += 1;
            Ok((outcome.alpha, outcome.envelope))
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    fn drea_ar(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            state.ar_counter = 0;
            return self.srea_reschedule(stn, state);
        }
        if executed_contingent {
            state.ar_counter += 1;
        }
        let bound = ar_reschedule_bound(state.previous_alpha, self.options.ar_threshold);
        if state.ar_counter >= bound {
            state.ar_counter = 0;
            self.srea_reschedule(stn, state)
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    fn drea_ara(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            state.factor = 1.0;
            return self.srea_reschedule(stn, state);
        }
        if !executed_contingent {
            return Ok(self.reuse_guide(stn, state));
        }
        let in_bounds = state.guide_min <= state.executed_time && state.executed_time <= state.guide_max;
        state.factor = if in_bounds {
            state.factor * (1.0 - state.previous_alpha)
        } else {
            (1.0 - state.previous_alpha).min(state.previous_alpha / 2.0)
        };
        if state.factor <= self.options.ar_threshold {
            state.factor = 1.0;
            self.srea_reschedule(stn, state)
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }

    /// Backs both `arsi` and `arsc`: the reference implementation exposes
    /// one decision rule under both CLI names. The AR-family counter decides
    /// whether to reschedule at all; if it does, the result is only sent
    /// (adopted) when the risk level actually moved by `si_threshold`.
    fn ar_send_policy(
        &self,
        stn: &Stn,
        state: &mut PolicyState,
        first_run: bool,
        executed_contingent: bool,
    ) -> StnResult<(f64, Stn)> {
        if first_run {
            state.ar_counter = 0;
            return self.srea_reschedule(stn, state);
        }
        if executed_contingent {
            state.ar_counter += 1;
        }
        let bound = ar_reschedule_bound(state.previous_alpha, self.options.ar_threshold);
        if state.ar_counter < bound {
            return Ok(self.reuse_guide(stn, state));
        }
        let previous_alpha = state.previous_alpha;
        let Some(outcome) = self.run_srea(stn, state)? else {
            return Ok(self.reuse_guide(stn, state));
        };
        if (outcome.alpha - previous_alpha).abs() >= self.options.si_threshold {
            state.ar_counter = 0;
            state.sends += 1;
            Ok((outcome.alpha, outcome.envelope))
        } else {
            Ok(self.reuse_guide(stn, state))
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "remaining-contingent counts stay tiny (network-sized), so the f64 conversion used as a geometric-probability exponent is exact in practice."
)]
fn f64_from_count(count: usize) -> f64 {
    count as f64
}

/// Picks, among `guide`'s not-yet-executed vertices reachable at or after
/// `current_time`, the one with the least Z-distance, ties broken by vertex
/// id. Returns `None` if no such vertex exists.
pub(crate) fn select_next_timepoint(guide: &Stn, current_time: f64) -> Option<SelectedTimepoint> {
    guide
        .vertices()
        .filter(|vertex| !vertex.is_executed())
        .filter_map(|vertex| guide.distance_from_zero(vertex.id()).map(|time| (vertex.id(), time)))
        .filter(|&(_, time)| time >= current_time)
        .min_by(|&(a_id, a_time), &(b_id, b_time)| {
            a_time
                .partial_cmp(&b_time)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a_id.get().cmp(&b_id.get()))
        })
        .map(|(vertex, time)| SelectedTimepoint {
            vertex,
            time,
            incoming_contingent: guide.incoming_contingent(vertex).is_some(),
        })
}
