//! Parses the `instances` JSON document format into [`Stn`]s.
//!
//! Ported from `run_simulator.py`'s loader. Each instance maps a name to an
//! array of edge records; event names are interned to [`VertexId`]s in
//! first-seen order, and the agent owning an event is derived from the
//! portion of its name before the first `_`. The Z reference timepoint
//! (id `0`, name `"Z"`) is always present and owned by no agent.
//!
//! All durations are seconds-denominated in the source document and are
//! scaled by 1000 on the way in, matching the crate's internal
//! millisecond resolution.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::distribution::{Distribution, DistributionError};
use crate::error::StnError;
use crate::ids::{AgentId, VertexId};
use crate::stn::Stn;

const MS_PER_UNIT: f64 = 1000.0;

#[derive(Debug, Deserialize)]
struct RawDocument {
    instances: Vec<HashMap<String, Vec<RawEdge>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawEdgeType {
    Controllable,
    UncontrollableProbabilistic,
    UncontrollableBounded,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(rename = "type")]
    kind: RawEdgeType,
    start_event_name: String,
    end_event_name: String,
    #[serde(default)]
    properties: RawProperties,
}

#[derive(Debug, Deserialize, Default)]
struct RawProperties {
    lb: Option<f64>,
    ub: Option<f64>,
    distribution: Option<RawDistribution>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawDistribution {
    Gaussian { mean: f64, variance: f64 },
    Uniform { lb: f64, ub: f64 },
}

/// Errors raised while parsing a PSTN document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// The document was not valid JSON, or did not match the expected shape.
    #[error("malformed PSTN document: {0}")]
    Json(#[from] serde_json::Error),
    /// An edge referenced a distribution whose parameters were invalid.
    #[error(transparent)]
    InvalidDistribution(#[from] DistributionError),
    /// Building the network itself failed (duplicate contingent parent).
    #[error(transparent)]
    Stn(#[from] StnError),
    /// An `uncontrollable_probabilistic` edge carried no `distribution`.
    #[error("edge {start:?} -> {end:?} is uncontrollable_probabilistic but has no distribution")]
    MissingDistribution {
        /// The edge's start event name.
        start: String,
        /// The edge's end event name.
        end: String,
    },
    /// An `uncontrollable_bounded` edge was missing `lb`/`ub`.
    #[error("edge {start:?} -> {end:?} is uncontrollable_bounded but has no lb/ub")]
    MissingBounds {
        /// The edge's start event name.
        start: String,
        /// The edge's end event name.
        end: String,
    },
}

struct Interner {
    vertices: HashMap<String, VertexId>,
    agents: HashMap<String, AgentId>,
    next_vertex: u32,
    next_agent: u32,
}

impl Interner {
    fn new() -> Self {
        let mut vertices = HashMap::new();
        vertices.insert("Z".to_string(), VertexId::ZERO);
        Self {
            vertices,
            agents: HashMap::new(),
            next_vertex: 1,
            next_agent: 0,
        }
    }

    fn agent_for(&mut self, event_name: &str) -> Option<AgentId> {
        if event_name == "Z" {
            return None;
        }
        let prefix = event_name.split('_').next().unwrap_or(event_name).to_string();
        if let Some(&id) = self.agents.get(&prefix) {
            return Some(id);
        }
        let id = AgentId::new(self.next_agent);
        self.next_agent += 1;
        self.agents.insert(prefix, id);
        Some(id)
    }

    fn vertex_for(&mut self, stn: &mut Stn, event_name: &str) -> VertexId {
        if let Some(&id) = self.vertices.get(event_name) {
            return id;
        }
        let id = VertexId::new(self.next_vertex);
        self.next_vertex += 1;
        let agent = self.agent_for(event_name);
        stn.add_vertex(id, agent);
        self.vertices.insert(event_name.to_string(), id);
        id
    }
}

/// Parses a PSTN document, returning one [`Stn`] per named instance, in
/// document order.
///
/// # Errors
/// Returns [`LoadError`] if the document is malformed, references an
/// incomplete distribution or bound, or builds an internally inconsistent
/// network (a contingent edge with two parents).
pub fn load(bytes: &[u8]) -> Result<Vec<(String, Stn)>, LoadError> {
    let document: RawDocument = serde_json::from_slice(bytes)?;
    let mut out = Vec::with_capacity(document.instances.len());

    for instance in document.instances {
        for (name, edges) in instance {
            out.push((name, load_instance(&edges)?));
        }
    }

    Ok(out)
}

fn load_instance(edges: &[RawEdge]) -> Result<Stn, LoadError> {
    let mut stn = Stn::new();
    let mut interner = Interner::new();

    for edge in edges {
        let start = interner.vertex_for(&mut stn, &edge.start_event_name);
        let end = interner.vertex_for(&mut stn, &edge.end_event_name);

        let distribution = edge_distribution(edge)?;
        let (lower, upper) = edge_bounds(edge, distribution.as_ref());

        stn.add_edge(start, end, lower, upper, distribution)?;
    }

    Ok(stn)
}

fn edge_distribution(edge: &RawEdge) -> Result<Option<Distribution>, LoadError> {
    match edge.kind {
        RawEdgeType::Controllable => Ok(None),
        RawEdgeType::UncontrollableBounded => {
            let lb = edge.properties.lb.ok_or_else(|| LoadError::MissingBounds {
                start: edge.start_event_name.clone(),
                end: edge.end_event_name.clone(),
            })?;
            let ub = edge.properties.ub.ok_or_else(|| LoadError::MissingBounds {
                start: edge.start_event_name.clone(),
                end: edge.end_event_name.clone(),
            })?;
            Ok(Some(Distribution::uniform(lb * MS_PER_UNIT, ub * MS_PER_UNIT)?))
        }
        RawEdgeType::UncontrollableProbabilistic => {
            let raw = edge
                .properties
                .distribution
                .as_ref()
                .ok_or_else(|| LoadError::MissingDistribution {
                    start: edge.start_event_name.clone(),
                    end: edge.end_event_name.clone(),
                })?;
            Ok(Some(match *raw {
                RawDistribution::Gaussian { mean, variance } => {
                    Distribution::gaussian(mean * MS_PER_UNIT, variance.sqrt() * MS_PER_UNIT)?
                }
                RawDistribution::Uniform { lb, ub } => {
                    Distribution::uniform(lb * MS_PER_UNIT, ub * MS_PER_UNIT)?
                }
            }))
        }
    }
}

fn edge_bounds(edge: &RawEdge, distribution: Option<&Distribution>) -> (f64, f64) {
    if let Some(distribution) = distribution {
        let sample_bounds = match *distribution {
            Distribution::Gaussian { .. } => (f64::NEG_INFINITY, f64::INFINITY),
            Distribution::Uniform { lower_ms, upper_ms } => (lower_ms, upper_ms),
        };
        return sample_bounds;
    }

    let lower = edge.properties.lb.map_or(f64::NEG_INFINITY, |lb| lb * MS_PER_UNIT);
    let upper = edge.properties.ub.map_or(f64::INFINITY, |ub| ub * MS_PER_UNIT);
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_controllable_edge_between_two_agents() {
        let json = br#"{
            "instances": [
                {
                    "two_agent_sync": [
                        {"type": "controllable", "start_event_name": "Z", "end_event_name": "A_start",
                         "properties": {"lb": 0.0, "ub": 0.0}},
                        {"type": "controllable", "start_event_name": "A_start", "end_event_name": "B_start",
                         "properties": {"lb": -5.0, "ub": 5.0}}
                    ]
                }
            ]
        }"#;

        let instances = load(json).expect("document parses");
        assert_eq!(instances.len(), 1);
        let (name, stn) = &instances[0];
        assert_eq!(name, "two_agent_sync");
        assert_eq!(stn.agents().count(), 2);
        assert!(stn.edges().any(|edge| edge.is_interagent()));
    }

    #[test]
    fn loads_an_uncontrollable_probabilistic_gaussian_edge() {
        let json = br#"{
            "instances": [
                {
                    "two_contingent": [
                        {"type": "controllable", "start_event_name": "Z", "end_event_name": "A_1",
                         "properties": {"lb": 0.0, "ub": 0.0}},
                        {"type": "uncontrollable_probabilistic", "start_event_name": "A_1", "end_event_name": "A_2",
                         "properties": {"distribution": {"type": "gaussian", "mean": 5.0, "variance": 1.0}}}
                    ]
                }
            ]
        }"#;

        let instances = load(json).expect("document parses");
        let (_, stn) = &instances[0];
        assert_eq!(stn.edges().filter(|edge| edge.is_contingent()).count(), 1);
    }

    #[test]
    fn rejects_a_probabilistic_edge_with_no_distribution() {
        let json = br#"{
            "instances": [
                {
                    "broken": [
                        {"type": "uncontrollable_probabilistic", "start_event_name": "Z", "end_event_name": "A_1",
                         "properties": {}}
                    ]
                }
            ]
        }"#;

        let err = load(json).expect_err("missing distribution is rejected");
        assert!(matches!(err, LoadError::MissingDistribution { .. }));
    }
}
