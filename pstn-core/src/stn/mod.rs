//! The temporal network graph: vertices, edges, propagation and sub-network
//! extraction.
//!
//! Ported from `libheat/stntools/stn.py`. Edges are stored directed (the
//! direction an edge was added in), so a contingent edge's child is always
//! recoverable as its `target`; symmetric (requirement/interagent) edges use
//! whichever direction the caller happened to add them in, which is
//! immaterial since both bounds are tracked explicitly.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::instrument;

use crate::distribution::Distribution;
use crate::error::{StnError, StnResult};
use crate::ids::{AgentId, VertexId};

/// A timepoint in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    id: VertexId,
    agent: Option<AgentId>,
    controllable: bool,
    executed: bool,
}

impl Vertex {
    /// Returns this timepoint's identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn id(&self) -> VertexId { self.id }

    /// Returns the agent that owns this timepoint, if any.
    #[rustfmt::skip]
    #[must_use]
    pub const fn agent(&self) -> Option<AgentId> { self.agent }

    /// Returns `true` if this timepoint's time is set by the environment
    /// rather than chosen by an agent.
    #[rustfmt::skip]
    #[must_use]
    pub const fn is_controllable(&self) -> bool { self.controllable }

    /// Returns `true` once this timepoint has been assigned a time.
    #[rustfmt::skip]
    #[must_use]
    pub const fn is_executed(&self) -> bool { self.executed }

    /// Marks this timepoint as executed.
    pub const fn execute(&mut self) {
        self.executed = true;
    }
}

/// The classification of an [`Edge`], derived from its endpoints' agents or
/// from the presence of a duration distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EdgeKind {
    /// Both endpoints share an agent, or either endpoint is the Z timepoint.
    Requirement,
    /// Endpoints belong to two distinct agents.
    InterAgent,
    /// The edge's duration is uncontrollable, drawn from `distribution`.
    Contingent {
        /// The edge's duration distribution.
        distribution: Distribution,
    },
}

/// A directed temporal bound: `lower_bound <= target - source <= upper_bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    source: VertexId,
    target: VertexId,
    lower_bound: f64,
    upper_bound: f64,
    kind: EdgeKind,
}

impl Edge {
    /// Returns the edge's source vertex.
    #[rustfmt::skip]
    #[must_use]
    pub const fn source(&self) -> VertexId { self.source }

    /// Returns the edge's target vertex.
    #[rustfmt::skip]
    #[must_use]
    pub const fn target(&self) -> VertexId { self.target }

    /// Returns the current lower bound on `target - source`.
    #[rustfmt::skip]
    #[must_use]
    pub const fn lower_bound(&self) -> f64 { self.lower_bound }

    /// Returns the current upper bound on `target - source`.
    #[rustfmt::skip]
    #[must_use]
    pub const fn upper_bound(&self) -> f64 { self.upper_bound }

    /// Returns this edge's classification.
    #[rustfmt::skip]
    #[must_use]
    pub const fn kind(&self) -> &EdgeKind { &self.kind }

    /// Returns `true` if this edge crosses two distinct agents.
    #[must_use]
    pub const fn is_interagent(&self) -> bool {
        matches!(self.kind, EdgeKind::InterAgent)
    }

    /// Returns `true` if this edge is contingent.
    #[must_use]
    pub const fn is_contingent(&self) -> bool {
        matches!(self.kind, EdgeKind::Contingent { .. })
    }
}

/// A probabilistic simple temporal network.
///
/// `Stn` derives `Clone`; copying an `Stn` copies its vertices, edges and
/// parent map verbatim, which is the entire state a timepoint needs to carry
/// (there is no separate local identifier to lose track of).
#[derive(Debug, Clone)]
pub struct Stn {
    vertices: BTreeMap<VertexId, Vertex>,
    edges: BTreeMap<(VertexId, VertexId), Edge>,
    /// Maps a contingent edge's child vertex to its parent (source) vertex.
    parents: BTreeMap<VertexId, VertexId>,
    agents: BTreeSet<AgentId>,
}

impl Default for Stn {
    fn default() -> Self {
        Self::new()
    }
}

impl Stn {
    /// Creates an empty network containing only the Z reference timepoint.
    #[must_use]
    pub fn new() -> Self {
        let mut vertices = BTreeMap::new();
        vertices.insert(
            VertexId::ZERO,
            Vertex {
                id: VertexId::ZERO,
                agent: None,
                controllable: true,
                executed: true,
            },
        );
        Self {
            vertices,
            edges: BTreeMap::new(),
            parents: BTreeMap::new(),
            agents: BTreeSet::new(),
        }
    }

    /// Returns every vertex in the network.
    #[must_use]
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    /// Returns every edge in the network.
    #[must_use]
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Returns every agent with at least one timepoint in the network.
    #[must_use]
    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.iter().copied()
    }

    /// Returns the vertex with the given id, if present.
    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// Returns a mutable reference to the vertex with the given id.
    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    /// Adds a vertex owned by `agent` (or `None` for the Z timepoint or an
    /// unowned event). Re-adding an existing id overwrites it.
    pub fn add_vertex(&mut self, id: VertexId, agent: Option<AgentId>) {
        if let Some(agent) = agent {
            self.agents.insert(agent);
        }
        self.vertices.insert(
            id,
            Vertex {
                id,
                agent,
                controllable: true,
                executed: false,
            },
        );
    }

    /// Removes a vertex, every edge incident to it, and any contingent
    /// parent-mapping entry referencing it.
    ///
    /// # Errors
    /// Returns [`StnError::UnknownVertex`] if `id` is not present.
    pub fn remove_vertex(&mut self, id: VertexId) -> StnResult<()> {
        self.vertices
            .remove(&id)
            .ok_or(StnError::UnknownVertex(id))?;
        self.edges
            .retain(|(source, target), _| *source != id && *target != id);
        self.parents.retain(|child, parent| *child != id && *parent != id);
        Ok(())
    }

    fn classify(&self, source: VertexId, target: VertexId) -> EdgeKind {
        let source_agent = self.vertices.get(&source).and_then(Vertex::agent);
        let target_agent = self.vertices.get(&target).and_then(Vertex::agent);
        match (source_agent, target_agent) {
            (Some(a), Some(b)) if a != b => EdgeKind::InterAgent,
            _ => EdgeKind::Requirement,
        }
    }

    /// Adds a directed bound from `source` to `target`.
    ///
    /// When `distribution` is `Some`, the edge is contingent and `target`
    /// becomes uncontrollable; `source` is recorded as `target`'s contingent
    /// parent.
    ///
    /// # Errors
    /// Returns [`StnError::UnknownVertex`] if either endpoint is absent, or
    /// [`StnError::DuplicateContingentParent`] if `target` already has a
    /// different contingent parent.
    pub fn add_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        lower_bound: f64,
        upper_bound: f64,
        distribution: Option<Distribution>,
    ) -> StnResult<()> {
        if !self.vertices.contains_key(&source) {
            return Err(StnError::UnknownVertex(source));
        }
        if !self.vertices.contains_key(&target) {
            return Err(StnError::UnknownVertex(target));
        }

        let kind = match distribution {
            Some(distribution) => {
                if let Some(existing) = self.parents.get(&target) {
                    if *existing != source {
                        return Err(StnError::DuplicateContingentParent {
                            child: target,
                            existing: *existing,
                        });
                    }
                }
                self.parents.insert(target, source);
                if let Some(vertex) = self.vertices.get_mut(&target) {
                    vertex.controllable = false;
                }
                EdgeKind::Contingent { distribution }
            }
            None => self.classify(source, target),
        };

        self.edges.insert(
            (source, target),
            Edge {
                source,
                target,
                lower_bound,
                upper_bound,
                kind,
            },
        );
        Ok(())
    }

    /// Looks up the edge between `a` and `b` in whichever direction it was
    /// stored, returning the bound interpreted from `a` to `b` together with
    /// whether the lookup was reversed.
    fn find(&self, a: VertexId, b: VertexId) -> Option<(&Edge, bool)> {
        if let Some(edge) = self.edges.get(&(a, b)) {
            return Some((edge, false));
        }
        self.edges.get(&(b, a)).map(|edge| (edge, true))
    }

    /// Tightens (or, with `force`, overwrites) the upper bound on
    /// `target - source <= weight`.
    ///
    /// When no edge exists between `source` and `target`, `create` controls
    /// whether one is added (as a [`EdgeKind::Requirement`] with an
    /// unbounded counterpart) or whether the call fails.
    ///
    /// # Errors
    /// Returns [`StnError::UnknownVertex`] if either endpoint is absent, or
    /// [`StnError::MissingEdge`] if no edge exists and `create` is `false`.
    pub fn update_edge(
        &mut self,
        source: VertexId,
        target: VertexId,
        weight: f64,
        create: bool,
        force: bool,
    ) -> StnResult<()> {
        if !self.vertices.contains_key(&source) {
            return Err(StnError::UnknownVertex(source));
        }
        if !self.vertices.contains_key(&target) {
            return Err(StnError::UnknownVertex(target));
        }

        if let Some((_, reversed)) = self.find(source, target) {
            let key = if reversed { (target, source) } else { (source, target) };
            if let Some(edge) = self.edges.get_mut(&key) {
                if reversed {
                    let candidate = -weight;
                    edge.lower_bound = if force {
                        candidate
                    } else {
                        edge.lower_bound.max(candidate)
                    };
                } else {
                    edge.upper_bound = if force {
                        weight
                    } else {
                        edge.upper_bound.min(weight)
                    };
                }
            }
            return Ok(());
        }

        if !create {
            return Err(StnError::MissingEdge { source, target });
        }

        let kind = self.classify(source, target);
        self.edges.insert(
            (source, target),
            Edge {
                source,
                target,
                lower_bound: f64::NEG_INFINITY,
                upper_bound: weight,
                kind,
            },
        );
        Ok(())
    }

    /// Runs Floyd-Warshall over the current edge bounds, tightening every
    /// existing edge's interval to its shortest-path value.
    ///
    /// Returns `true` if the network remains consistent (no vertex has a
    /// negative-length cycle through itself), `false` otherwise. Edges are
    /// rewritten regardless, matching the reference propagation step, so
    /// callers should check the return value before trusting the result.
    ///
    /// # Errors
    /// Returns [`StnError::UnknownVertex`] only if internal bookkeeping is
    /// violated; this should not occur for a well-formed network.
    #[instrument(name = "stn.floyd_warshall", skip(self), fields(vertices = self.vertices.len(), edges = self.edges.len()))]
    pub fn floyd_warshall(&mut self) -> StnResult<bool> {
        let ids: Vec<VertexId> = self.vertices.keys().copied().collect();
        let n = ids.len();
        let index: BTreeMap<VertexId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut dist = vec![vec![f64::INFINITY; n]; n];
        for i in 0..n {
            dist[i][i] = 0.0;
        }
        for edge in self.edges.values() {
            let Some(&i) = index.get(&edge.source) else {
                return Err(StnError::UnknownVertex(edge.source));
            };
            let Some(&j) = index.get(&edge.target) else {
                return Err(StnError::UnknownVertex(edge.target));
            };
            if edge.upper_bound < dist[i][j] {
                dist[i][j] = edge.upper_bound;
            }
            let reverse = -edge.lower_bound;
            if reverse < dist[j][i] {
                dist[j][i] = reverse;
            }
        }

        for k in 0..n {
            for i in 0..n {
                if dist[i][k].is_infinite() {
                    continue;
                }
                for j in 0..n {
                    let candidate = dist[i][k] + dist[k][j];
                    if candidate < dist[i][j] {
                        dist[i][j] = candidate;
                    }
                }
            }
        }

        let consistent = (0..n).all(|i| dist[i][i] >= 0.0);

        for edge in self.edges.values_mut() {
            let Some(&i) = index.get(&edge.source) else {
                continue;
            };
            let Some(&j) = index.get(&edge.target) else {
                continue;
            };
            edge.upper_bound = dist[i][j];
            edge.lower_bound = -dist[j][i];
        }

        if !consistent {
            tracing::debug!("network is inconsistent after propagation");
        }

        Ok(consistent)
    }

    /// Returns a lightweight consistency check that does not re-run
    /// Floyd-Warshall: `true` unless some edge's lower bound now exceeds its
    /// upper bound.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.edges.values().all(|edge| edge.lower_bound <= edge.upper_bound)
    }

    /// Extracts the sub-network containing `agent`'s own timepoints, the Z
    /// timepoint, and every edge between them.
    ///
    /// Interagent edges never appear in the result: by construction they
    /// require two distinct non-Z agents on their endpoints, and this
    /// sub-network only ever contains one agent's vertices plus Z.
    #[must_use]
    pub fn get_sub_stn(&self, agent: AgentId) -> Self {
        let keep: BTreeSet<VertexId> = self
            .vertices
            .values()
            .filter(|vertex| vertex.agent == Some(agent) || vertex.id.is_zero())
            .map(Vertex::id)
            .collect();

        let vertices = self
            .vertices
            .iter()
            .filter(|(id, _)| keep.contains(id))
            .map(|(id, vertex)| (*id, *vertex))
            .collect();

        let edges = self
            .edges
            .iter()
            .filter(|(_, edge)| keep.contains(&edge.source) && keep.contains(&edge.target))
            .map(|(key, edge)| (*key, *edge))
            .collect();

        let parents = self
            .parents
            .iter()
            .filter(|(child, parent)| keep.contains(child) && keep.contains(parent))
            .map(|(child, parent)| (*child, *parent))
            .collect();

        let mut agents = BTreeSet::new();
        agents.insert(agent);

        Self {
            vertices,
            edges,
            parents,
            agents,
        }
    }

    /// Returns `vertex`'s contingent parent, if it is the uncontrollable end
    /// of a contingent edge.
    #[must_use]
    pub fn incoming_contingent(&self, vertex: VertexId) -> Option<VertexId> {
        self.parents.get(&vertex).copied()
    }

    /// Returns `true` if `vertex` is the source of a contingent edge whose
    /// child has already executed.
    #[must_use]
    pub fn outgoing_executed(&self, vertex: VertexId) -> bool {
        self.parents.iter().any(|(child, parent)| {
            *parent == vertex
                && self
                    .vertices
                    .get(child)
                    .is_some_and(Vertex::is_executed)
        })
    }

    /// Re-samples every contingent edge's duration, fixing its interval to
    /// the drawn (rounded) value.
    ///
    /// # Errors
    /// Returns [`StnError::InvalidDistribution`] if a distribution's
    /// parameters became invalid (unreachable for networks built through
    /// [`Self::add_edge`]'s fallible constructors).
    pub fn resample_contingent_edges(&mut self, rng: &mut impl Rng) -> StnResult<()> {
        for edge in self.edges.values_mut() {
            if let EdgeKind::Contingent { distribution } = edge.kind {
                let sampled = distribution.sample(rng)?;
                edge.lower_bound = sampled;
                edge.upper_bound = sampled;
            }
        }
        Ok(())
    }

    /// Assigns `vertex` to `time`, fixing its distance to Z in both
    /// directions and marking it executed.
    ///
    /// # Errors
    /// Returns [`StnError::UnknownVertex`] if `vertex` is absent.
    pub fn assign_timepoint(&mut self, vertex: VertexId, time: f64) -> StnResult<()> {
        if !vertex.is_zero() {
            self.update_edge(VertexId::ZERO, vertex, time, true, true)?;
            self.update_edge(vertex, VertexId::ZERO, -time, true, true)?;
        }
        self.vertex_mut(vertex)
            .ok_or(StnError::UnknownVertex(vertex))?
            .execute();
        Ok(())
    }

    /// Returns the current resolved distance from Z to `vertex`, if the
    /// network records one (directly or transitively via a prior
    /// [`Self::floyd_warshall`] pass).
    #[must_use]
    pub fn distance_from_zero(&self, vertex: VertexId) -> Option<f64> {
        if vertex.is_zero() {
            return Some(0.0);
        }
        self.find(VertexId::ZERO, vertex).map(|(edge, reversed)| {
            if reversed {
                -edge.lower_bound
            } else {
                edge.upper_bound
            }
        })
    }

    /// Returns `(lower, upper)` bounds on `vertex - Z`, defaulting to
    /// `(-infinity, infinity)` when the network records no constraint
    /// between `vertex` and Z.
    #[must_use]
    pub fn zero_bounds(&self, vertex: VertexId) -> (f64, f64) {
        if vertex.is_zero() {
            return (0.0, 0.0);
        }
        self.find(VertexId::ZERO, vertex)
            .map(|(edge, reversed)| {
                if reversed {
                    (-edge.upper_bound, -edge.lower_bound)
                } else {
                    (edge.lower_bound, edge.upper_bound)
                }
            })
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
    }

    /// Removes every executed vertex (other than Z) whose edges to Z have
    /// both collapsed to a single point and which can no longer influence
    /// any unexecuted timepoint's bounds directly. This is a conservative
    /// garbage-collection step: only vertices with no outgoing edges to a
    /// still-unexecuted vertex are removed.
    pub fn remove_old_timepoints(&mut self) {
        let removable: Vec<VertexId> = self
            .vertices
            .values()
            .filter(|vertex| {
                vertex.is_executed()
                    && !vertex.id.is_zero()
                    && !self.edges.values().any(|edge| {
                        (edge.source == vertex.id || edge.target == vertex.id)
                            && self.other_end(edge, vertex.id).is_some_and(|other| {
                                !self
                                    .vertices
                                    .get(&other)
                                    .is_some_and(Vertex::is_executed)
                            })
                    })
            })
            .map(Vertex::id)
            .collect();

        for id in removable {
            let _ = self.remove_vertex(id);
        }
    }

    fn other_end(&self, edge: &Edge, vertex: VertexId) -> Option<VertexId> {
        if edge.source == vertex {
            Some(edge.target)
        } else if edge.target == vertex {
            Some(edge.source)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests;
