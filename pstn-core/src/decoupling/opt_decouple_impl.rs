//! Wilson's synchrony-flexibility decoupling LP.
//!
//! Ported from `libheat/decoupling/optdecouple.py`. Builds an LP over
//! box-bounded `t_i^+`/`t_i^-` variables per vertex: requirement and
//! interagent edges get the same two cross-sign inequalities as SREA (with
//! weights clamped to `±1e40`), while contingent edges get a plain equality
//! constraint pinning `t_j - t_i` to the risk-level cut-point (no delta
//! slack, unlike SREA — a contingent edge's duration here is either met or
//! the LP is infeasible). The objective maximises total flexibility
//! (`t_i^+ - t_i^-`) summed over the network's synchrony points (the
//! endpoints of interagent edges). A continuous binary search over `alpha`
//! (to `fidelity` precision, unlike SREA's integer-per-mille grid) finds the
//! largest risk level that keeps the LP feasible.

use std::collections::BTreeSet;

use good_lp::solvers::coin_cbc::coin_cbc;
use good_lp::{ProblemVariables, Solution, SolverModel, constraint};
use tracing::instrument;

use crate::error::{StnError, StnResult};
use crate::ids::{AgentId, VertexId};
use crate::lp::{LpError, allocate_vertex_vars, clamp_weight, signed_distance};
use crate::stn::{EdgeKind, Stn};

use super::DecoupleOutcome;

/// Upper bound on the synchrony-flexibility search, chosen large enough that
/// no realistic schedule would need more slack than this at a single
/// timepoint.
const MAX_ALPHA_WIDTH: f64 = 1.0e6;

/// Decouples `stn` into one sub-network per agent using Wilson's LP.
///
/// # Errors
/// Propagates any [`StnError`](crate::error::StnError) raised while rewriting
/// edges in the solved envelope.
#[instrument(name = "decoupling.opt_decouple", skip(stn), fields(vertices = stn.vertices().count()))]
pub fn opt_decouple(stn: &Stn, fidelity: f64) -> StnResult<DecoupleOutcome> {
    let sync_points: Vec<VertexId> = stn
        .edges()
        .filter(|edge| edge.is_interagent())
        .flat_map(|edge| [edge.source(), edge.target()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if sync_points.is_empty() {
        return Ok(DecoupleOutcome {
            alpha: 0.0,
            subproblems: None,
        });
    }

    let Some(mut best_envelope) = solve_wilson(stn, &sync_points, 0.0)? else {
        return Ok(DecoupleOutcome {
            alpha: 0.0,
            subproblems: None,
        });
    };

    let mut low = 0.0_f64;
    let mut high = MAX_ALPHA_WIDTH;
    while high - low > fidelity {
        let mid = low + (high - low) / 2.0;
        match solve_wilson(stn, &sync_points, mid)? {
            Some(envelope) => {
                best_envelope = envelope;
                low = mid;
            }
            None => high = mid,
        }
    }

    let subproblems = split_by_agent(stn, &best_envelope)?;
    Ok(DecoupleOutcome {
        alpha: low,
        subproblems: Some(subproblems),
    })
}

fn solve_wilson(
    stn: &Stn,
    sync_points: &[VertexId],
    alpha: f64,
) -> StnResult<Option<Stn>> {
    let mut vars = ProblemVariables::new();
    let ids: Vec<VertexId> = stn.vertices().map(|vertex| vertex.id()).collect();
    let vertex_vars = allocate_vertex_vars(&mut vars, stn, ids.iter().copied());

    let objective = sync_points
        .iter()
        .filter_map(|id| vertex_vars.get(id))
        .fold(good_lp::Expression::from(0.0), |acc, v| {
            acc + signed_distance(v)
        });

    let mut problem = vars.maximise(objective).using(coin_cbc);

    for vars in vertex_vars.values() {
        problem = problem.with(constraint!(vars.plus >= vars.minus));
    }

    for edge in stn.edges() {
        let Some(source_vars) = vertex_vars.get(&edge.source()) else {
            continue;
        };
        let Some(target_vars) = vertex_vars.get(&edge.target()) else {
            continue;
        };

        match edge.kind() {
            EdgeKind::Contingent { distribution } => {
                let half_risk = alpha / 2.0;
                let p_ij = distribution.inverse_cdf(1.0 - half_risk)?;
                let p_ji = -distribution.inverse_cdf(half_risk)?;
                problem = problem.with(constraint!(
                    target_vars.plus - source_vars.plus == p_ij
                ));
                problem = problem.with(constraint!(
                    source_vars.minus - target_vars.minus == p_ji
                ));
            }
            EdgeKind::Requirement | EdgeKind::InterAgent => {
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
            Ok(Some(envelope))
        }
        Err(good_lp::ResolutionError::Infeasible) => Ok(None),
        Err(other) => Err(StnError::Lp(LpError::SolverFailed(other.to_string()))),
    }
}

fn split_by_agent(original: &Stn, envelope: &Stn) -> StnResult<Vec<(AgentId, Stn)>> {
    let mut rewritten = original.clone();
    for edge in original.edges() {
        if edge.is_interagent() {
            for endpoint in [edge.source(), edge.target()] {
                let (lower, upper) = envelope.zero_bounds(endpoint);
                rewritten.update_edge(VertexId::ZERO, endpoint, upper, true, true)?;
                rewritten.update_edge(endpoint, VertexId::ZERO, -lower, true, true)?;
            }
        }
    }

    Ok(rewritten
        .agents()
        .map(|agent| (agent, rewritten.get_sub_stn(agent)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AgentId;

    #[test]
    fn returns_no_subproblems_without_interagent_edges() {
        let mut stn = Stn::new();
        let agent = AgentId::new(0);
        let v = VertexId::new(1);
        stn.add_vertex(v, Some(agent));
        stn.add_edge(VertexId::ZERO, v, 0.0, 10.0, None)
            .expect("edge is valid");

        let outcome = opt_decouple(&stn, 0.01).expect("decoupling runs");
        assert!(outcome.subproblems.is_none());
        assert!((outcome.alpha - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decouples_a_two_agent_network() {
        let mut stn = Stn::new();
        let agent_a = AgentId::new(0);
        let agent_b = AgentId::new(1);
        let a = VertexId::new(1);
        let b = VertexId::new(2);
        stn.add_vertex(a, Some(agent_a));
        stn.add_vertex(b, Some(agent_b));
        stn.add_edge(VertexId::ZERO, a, 0.0, 100.0, None)
            .expect("edge is valid");
        stn.add_edge(VertexId::ZERO, b, 0.0, 100.0, None)
            .expect("edge is valid");
        stn.add_edge(a, b, -50.0, 50.0, None).expect("edge is valid");

        let outcome = opt_decouple(&stn, 0.01).expect("decoupling runs");
        let subproblems = outcome.subproblems.expect("decoupling succeeds");
        assert_eq!(subproblems.len(), 2);
        for (_, sub) in &subproblems {
            assert!(sub.edges().all(|edge| !edge.is_interagent()));
        }
    }
}
