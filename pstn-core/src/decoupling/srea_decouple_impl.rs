//! Decoupling by reusing a whole-network SREA envelope.
//!
//! Ported from `libheat/decoupling/sreadecouple.py`. Rather than solving a
//! dedicated flexibility LP, this strategy runs [`crate::srea::srea`] once
//! over the whole network and simply adopts its envelope's bounds on every
//! interagent edge before splitting into per-agent sub-networks.

use tracing::instrument;

use crate::error::StnResult;
use crate::ids::{AgentId, VertexId};
use crate::srea;
use crate::stn::Stn;

use super::DecoupleOutcome;

/// Decouples `stn` by reusing a whole-network SREA envelope.
///
/// # Errors
/// Propagates any [`StnError`](crate::error::StnError) raised while rewriting
/// edges in the solved envelope.
#[instrument(name = "decoupling.srea_decouple", skip(stn), fields(vertices = stn.vertices().count()))]
pub fn srea_decouple(stn: &Stn) -> StnResult<DecoupleOutcome> {
    let Some(outcome) = srea::srea(stn)? else {
        return Ok(DecoupleOutcome {
            alpha: 0.0,
            subproblems: None,
        });
    };

    let mut rewritten = stn.clone();
    for edge in stn.edges() {
        if edge.is_interagent() {
            for endpoint in [edge.source(), edge.target()] {
                let (lower, upper) = outcome.envelope.zero_bounds(endpoint);
                rewritten.update_edge(VertexId::ZERO, endpoint, upper, true, true)?;
                rewritten.update_edge(endpoint, VertexId::ZERO, -lower, true, true)?;
            }
        }
    }

    let subproblems: Vec<(AgentId, Stn)> = rewritten
        .agents()
        .map(|agent| (agent, rewritten.get_sub_stn(agent)))
        .collect();

    Ok(DecoupleOutcome {
        alpha: outcome.alpha,
        subproblems: Some(subproblems),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;

    #[test]
    fn decouples_using_the_srea_envelope() {
        let mut stn = Stn::new();
        let agent_a = AgentId::new(0);
        let agent_b = AgentId::new(1);
        let a = VertexId::new(1);
        let a2 = VertexId::new(2);
        let b = VertexId::new(3);
        stn.add_vertex(a, Some(agent_a));
        stn.add_vertex(a2, Some(agent_a));
        stn.add_vertex(b, Some(agent_b));
        stn.add_edge(VertexId::ZERO, a, 0.0, 0.0, None)
            .expect("edge is valid");
        let dist = Distribution::gaussian(1000.0, 100.0).expect("valid distribution");
        stn.add_edge(a, a2, 0.0, 3000.0, Some(dist))
            .expect("edge is valid");
        stn.add_edge(a2, b, -50.0, 50.0, None).expect("edge is valid");

        let outcome = srea_decouple(&stn).expect("decoupling runs");
        let subproblems = outcome.subproblems.expect("decoupling succeeds");
        assert_eq!(subproblems.len(), 2);
    }

    #[test]
    fn fails_when_srea_itself_has_no_feasible_envelope() {
        let mut stn = Stn::new();
        let v = VertexId::new(1);
        stn.add_vertex(v, None);
        stn.add_edge(VertexId::ZERO, v, 5.0, 1.0, None)
            .expect("edge is valid");

        let outcome = srea_decouple(&stn).expect("decoupling runs");
        assert!(outcome.subproblems.is_none());
    }
}
