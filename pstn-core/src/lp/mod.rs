//! Shared linear-programming plumbing for SREA and the decoupling LPs.
//!
//! Both algorithms build a `good_lp` problem over one pair of variables per
//! vertex (`t_i^+`, `t_i^-`), representing the positive and negative half of
//! that vertex's signed distance to Z, box-bounded to the network's current
//! `[-w(i,Z), w(Z,i)]` interval (per Lund et al.'s formulation — these are
//! not forced non-negative, since a vertex may already be constrained to lie
//! strictly before Z), and solve with the `coin_cbc` backend.

use std::collections::BTreeMap;

use good_lp::{Expression, ProblemVariables, Variable, variable};
use thiserror::Error;

use crate::ids::VertexId;
use crate::stn::Stn;

/// Weights beyond this magnitude are clamped before entering the LP, since
/// `good_lp`/CBC cannot usefully reason about genuine infinities as finite
/// bounds. Matches the reference Wilson LP's `1e40` clamp.
pub const INFINITE_WEIGHT_CLAMP: f64 = 1e40;

/// Clamps a weight that may be `f64::INFINITY`/`f64::NEG_INFINITY` to a large
/// finite magnitude suitable for an LP bound.
#[must_use]
pub fn clamp_weight(weight: f64) -> f64 {
    weight.clamp(-INFINITE_WEIGHT_CLAMP, INFINITE_WEIGHT_CLAMP)
}

/// Errors raised while building or solving an LP, for failures other than
/// plain infeasibility (which both SREA and the decoupling search treat as a
/// normal "no envelope at this risk level" outcome, not an error).
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum LpError {
    /// The solver failed for a reason other than infeasibility.
    #[error("solver failed: {0}")]
    SolverFailed(String),
}

/// The pair of variables representing a vertex's signed distance to Z.
#[derive(Debug, Clone, Copy)]
pub struct VertexVars {
    /// The positive half of the distance, box-bounded to `[-w(i,Z), w(Z,i)]`.
    pub plus: Variable,
    /// The negative half of the distance, box-bounded to `[-w(i,Z), w(Z,i)]`.
    pub minus: Variable,
}

/// Allocates a `t_i^+`/`t_i^-` variable pair for every vertex id in `ids`, in
/// a deterministic (sorted) order, each bounded to `stn`'s current distance
/// interval to Z.
pub fn allocate_vertex_vars(
    vars: &mut ProblemVariables,
    stn: &Stn,
    ids: impl IntoIterator<Item = VertexId>,
) -> BTreeMap<VertexId, VertexVars> {
    let mut out = BTreeMap::new();
    for id in ids {
        let (lower, upper) = stn.zero_bounds(id);
        let lower = clamp_weight(lower);
        let upper = clamp_weight(upper);
        let plus = vars.add(variable().min(lower).max(upper));
        let minus = vars.add(variable().min(lower).max(upper));
        out.insert(id, VertexVars { plus, minus });
    }
    out
}

/// Allocates a non-negative slack variable bounded above by `upper` (clamped
/// to at least `0.0`, since a negative cap would make the variable
/// infeasible by construction).
pub fn add_slack_var(vars: &mut ProblemVariables, upper: f64) -> Variable {
    vars.add(variable().min(0.0).max(upper.max(0.0)))
}

/// Returns the expression `t_i^+ - t_i^-`, the vertex's signed distance to Z.
#[must_use]
pub fn signed_distance(vars: &VertexVars) -> Expression {
    vars.plus - vars.minus
}
