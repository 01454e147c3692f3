//! Per-sample outcome aggregation.
//!
//! Ported from `run_simulator.py::across_paths` and `libheat/sim2csv.py`'s
//! row shape: each simulated sample contributes one row describing the
//! network it ran against and whether dispatch stayed consistent.

use serde::{Deserialize, Serialize};

use crate::ids::VertexId;
use crate::stn::Stn;

/// The aggregate outcome of dispatching a single resampled network.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SampleOutcome {
    /// Index of the sample within its batch.
    pub sample_index: u64,
    /// `true` if dispatch completed without an inconsistency.
    pub robust: bool,
    /// Number of timepoints in the network (excluding Z).
    pub vertex_count: usize,
    /// Number of contingent edges in the network.
    pub contingent_count: usize,
    /// Number of distinct synchrony points (endpoints of an interagent edge).
    pub synchrony_point_count: usize,
    /// Achieved robustness level, if the dispatch strategy computed one.
    pub alpha: Option<f64>,
}

impl SampleOutcome {
    /// Builds an outcome from a network and the result of dispatching it.
    #[must_use]
    pub fn from_network(sample_index: u64, stn: &Stn, robust: bool, alpha: Option<f64>) -> Self {
        let vertex_count = stn.vertices().filter(|vertex| !vertex.id().is_zero()).count();
        let contingent_count = stn.edges().filter(|edge| edge.is_contingent()).count();
        let synchrony_point_count = stn
            .edges()
            .filter(|edge| edge.is_interagent())
            .flat_map(|edge| [edge.source(), edge.target()])
            .collect::<std::collections::BTreeSet<VertexId>>()
            .len();

        Self {
            sample_index,
            robust,
            vertex_count,
            contingent_count,
            synchrony_point_count,
            alpha,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::AgentId;

    #[test]
    fn counts_reflect_network_contents() {
        let mut stn = Stn::new();
        let agent_a = AgentId::new(0);
        let agent_b = AgentId::new(1);
        let a = VertexId::new(1);
        let b = VertexId::new(2);
        stn.add_vertex(a, Some(agent_a));
        stn.add_vertex(b, Some(agent_b));
        stn.add_edge(VertexId::ZERO, a, 0.0, 0.0, None)
            .expect("edge is valid");
        stn.add_edge(a, b, -10.0, 10.0, None).expect("edge is valid");

        let outcome = SampleOutcome::from_network(0, &stn, true, Some(0.5));
        assert_eq!(outcome.vertex_count, 2);
        assert_eq!(outcome.synchrony_point_count, 2);
        assert_eq!(outcome.contingent_count, 0);
        assert!(outcome.robust);
    }
}
