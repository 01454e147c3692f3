//! The Static Robust Execution Algorithm (SREA).
//!
//! Ported from `libheat/srea.py`. Builds the Lund et al. LP whose feasibility
//! at a given risk level `alpha` certifies that every contingent duration can
//! be constrained to its `alpha`-risk interval, with slack absorbed by a
//! `delta` variable per contingent edge, while still satisfying every
//! requirement and interagent bound. Binary-searches `alpha` over an integer
//! per-mille grid to find the most robust schedule that remains solvable.

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{Expression, ProblemVariables, Solution, SolverModel, Variable, constraint};
use tracing::instrument;

use crate::error::{StnError, StnResult};
use crate::ids::VertexId;
use crate::lp::{LpError, add_slack_var, allocate_vertex_vars, clamp_weight};
use crate::stn::{Edge, EdgeKind, Stn};

/// The per-mille resolution of the alpha binary search, matching the
/// reference implementation's integer-millisecond-scale grid.
const ALPHA_STEPS: u32 = 1000;

/// The outcome of a successful SREA run.
#[derive(Debug, Clone)]
pub struct SreaOutcome {
    /// The most robust risk level (in `[0.0, 1.0]`) for which the envelope
    /// below is feasible.
    pub alpha: f64,
    /// The STN rewritten with the solved envelope.
    pub envelope: Stn,
}

/// The pair of delta slack variables absorbed by one contingent edge, plus
/// the cut-points they were built from.
struct ContingentSlack {
    delta_ij: Variable,
    delta_ji: Variable,
    p_ij: f64,
    p_ji: f64,
}

/// Runs SREA over `stn`, returning the most robust feasible envelope.
///
/// Returns `Ok(None)` when even the most conservative schedule (`alpha =
/// 0`) is infeasible — the network cannot be executed robustly at all.
///
/// # Errors
/// Returns [`StnError`] if the network is malformed (a contingent edge's
/// distribution became invalid), or if the solver fails for a reason other
/// than infeasibility.
#[instrument(name = "srea.solve", skip(stn), fields(vertices = stn.vertices().count()))]
pub fn srea(stn: &Stn) -> StnResult<Option<SreaOutcome>> {
    let mut low = 0_u32;
    let mut high = ALPHA_STEPS;

    let Some(mut best) = solve_at_alpha(stn, 0.0)? else {
        return Ok(None);
    };

    while low < high {
        let mid = low + (high - low + 1) / 2;
        let alpha = f64::from(mid) / f64::from(ALPHA_STEPS);
        match solve_at_alpha(stn, alpha)? {
            Some(outcome) => {
                best = outcome;
                low = mid;
            }
            None => {
                high = mid - 1;
            }
        }
    }

    Ok(Some(best))
}

fn solve_at_alpha(stn: &Stn, alpha: f64) -> StnResult<Option<SreaOutcome>> {
    let mut vars = ProblemVariables::new();
    let ids: Vec<VertexId> = stn.vertices().map(|vertex| vertex.id()).collect();
    let vertex_vars = allocate_vertex_vars(&mut vars, stn, ids.iter().copied());

    let edges: Vec<&Edge> = stn.edges().collect();
    let half_risk = alpha / 2.0;

    let mut slacks: Vec<Option<ContingentSlack>> = Vec::with_capacity(edges.len());
    let mut objective = Expression::from(0.0);

    for edge in &edges {
        if let EdgeKind::Contingent { distribution } = edge.kind() {
            let p_ij = distribution.inverse_cdf(1.0 - half_risk)?;
            let p_ji = -distribution.inverse_cdf(half_risk)?;
            let cap_ij = (edge.upper_bound() - p_ij).max(0.0);
            let cap_ji = (-edge.lower_bound() - p_ji).max(0.0);
            let delta_ij = add_slack_var(&mut vars, cap_ij);
            let delta_ji = add_slack_var(&mut vars, cap_ji);
            objective = objective + delta_ij + delta_ji;
            slacks.push(Some(ContingentSlack {
                delta_ij,
                delta_ji,
                p_ij,
                p_ji,
            }));
        } else {
            slacks.push(None);
        }
    }

    let mut problem = vars.maximise(objective).using(coin_cbc);

    for vars in vertex_vars.values() {
        problem = problem.with(constraint!(vars.plus >= vars.minus));
    }

    for (edge, slack) in edges.iter().zip(slacks.iter()) {
        let Some(source_vars) = vertex_vars.get(&edge.source()) else {
            continue;
        };
        let Some(target_vars) = vertex_vars.get(&edge.target()) else {
            continue;
        };

        match slack {
            Some(slack) => {
                problem = problem.with(constraint!(
                    target_vars.plus - source_vars.plus == slack.p_ij + slack.delta_ij
                ));
                problem = problem.with(constraint!(
                    target_vars.minus - source_vars.minus == -slack.p_ji - slack.delta_ji
                ));
            }
            None => {
                problem = problem.with(constraint!(
                    target_vars.plus - source_vars.minus <= clamp_weight(edge.upper_bound())
                ));
                problem = problem.with(constraint!(
                    source_vars.plus - target_vars.minus <= clamp_weight(-edge.lower_bound())
                ));
            }
        }
    }

    match problem.solve() {
        Ok(solution) => {
            let mut envelope = stn.clone();
            for (&id, vars) in &vertex_vars {
                let plus = solution.value(vars.plus).ceil();
                let minus = solution.value(vars.minus).ceil();
                if !id.is_zero() {
                    envelope.update_edge(VertexId::ZERO, id, plus, true, true)?;
                    envelope.update_edge(id, VertexId::ZERO, -minus, true, true)?;
                }
            }
            Ok(Some(SreaOutcome { alpha, envelope }))
        }
        Err(good_lp::ResolutionError::Infeasible) => Ok(None),
        Err(other) => Err(StnError::Lp(LpError::SolverFailed(other.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::ids::AgentId;

    #[test]
    fn srea_solves_a_single_contingent_edge() {
        let mut stn = Stn::new();
        let agent = AgentId::new(0);
        let start = VertexId::new(1);
        let end = VertexId::new(2);
        stn.add_vertex(start, Some(agent));
        stn.add_vertex(end, Some(agent));
        stn.add_edge(VertexId::ZERO, start, 0.0, 0.0, None)
            .expect("edge is valid");
        let dist = Distribution::gaussian(1000.0, 100.0).expect("valid distribution");
        stn.add_edge(start, end, 500.0, 1500.0, Some(dist))
            .expect("edge is valid");

        let outcome = srea(&stn).expect("srea runs").expect("srea finds an envelope");
        assert!((0.0..=1.0).contains(&outcome.alpha));

        let (_, end_upper) = outcome.envelope.zero_bounds(end);
        let (start_lower, start_upper) = outcome.envelope.zero_bounds(start);
        assert!((start_lower..=start_upper).contains(&0.0));
        // The envelope must still satisfy the contingent edge's original
        // [500, 1500] requirement measured from the solved start time.
        assert!(end_upper - start_upper <= 1500.0 + f64::EPSILON);
    }

    #[test]
    fn srea_widens_alpha_when_bounds_are_tight() {
        let mut stn = Stn::new();
        let agent = AgentId::new(0);
        let start = VertexId::new(1);
        let end = VertexId::new(2);
        stn.add_vertex(start, Some(agent));
        stn.add_vertex(end, Some(agent));
        stn.add_edge(VertexId::ZERO, start, 0.0, 0.0, None)
            .expect("edge is valid");
        let dist = Distribution::gaussian(1000.0, 100.0).expect("valid distribution");
        // A window tighter than the distribution's near-certain range forces
        // the search away from alpha = 0.
        stn.add_edge(start, end, 950.0, 1050.0, Some(dist))
            .expect("edge is valid");

        let outcome = srea(&stn).expect("srea runs").expect("srea finds an envelope");
        assert!(outcome.alpha > 0.0);
    }

    #[test]
    fn srea_fails_on_an_unsatisfiable_requirement() {
        let mut stn = Stn::new();
        let v = VertexId::new(1);
        stn.add_vertex(v, None);
        stn.add_edge(VertexId::ZERO, v, 5.0, 1.0, None)
            .expect("edge is valid");

        let outcome = srea(&stn).expect("srea runs");
        assert!(outcome.is_none());
    }
}
