//! Error types shared across the PSTN engine.
//!
//! Follows the same paired-enum convention throughout the crate: a
//! `thiserror`-derived error carrying rich context, plus a stable
//! `*ErrorCode` companion for callers that want to match without depending on
//! message text.

use thiserror::Error;

use crate::VertexId;
use crate::distribution::DistributionError;
use crate::lp::LpError;

/// Stable codes describing [`StnError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum StnErrorCode {
    /// A referenced vertex does not exist in the network.
    UnknownVertex,
    /// A contingent edge would give its child a second parent.
    DuplicateContingentParent,
    /// An edge update targeted a missing edge with `create = false`.
    MissingEdge,
    /// A distribution parameter was invalid.
    InvalidDistribution,
    /// An LP solve failed for a reason other than infeasibility.
    LpSolverFailed,
}

impl StnErrorCode {
    /// Returns the stable machine-readable representation of this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownVertex => "STN_UNKNOWN_VERTEX",
            Self::DuplicateContingentParent => "STN_DUPLICATE_CONTINGENT_PARENT",
            Self::MissingEdge => "STN_MISSING_EDGE",
            Self::InvalidDistribution => "STN_INVALID_DISTRIBUTION",
            Self::LpSolverFailed => "STN_LP_SOLVER_FAILED",
        }
    }
}

/// Errors raised while building or mutating a [`crate::Stn`].
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Error)]
pub enum StnError {
    /// A referenced vertex does not exist in the network.
    #[error("vertex {0:?} is not present in this network")]
    UnknownVertex(VertexId),
    /// A contingent edge would give `child` a second parent.
    #[error("vertex {child:?} already has contingent parent {existing:?}")]
    DuplicateContingentParent {
        /// The contingent edge's child vertex.
        child: VertexId,
        /// The parent already recorded for `child`.
        existing: VertexId,
    },
    /// An edge update targeted a missing edge with `create = false`.
    #[error("no edge from {source:?} to {target:?}; pass create = true to add one")]
    MissingEdge {
        /// The edge's source vertex.
        source: VertexId,
        /// The edge's target vertex.
        target: VertexId,
    },
    /// A distribution parameter was invalid.
    #[error(transparent)]
    InvalidDistribution(#[from] DistributionError),
    /// An LP solve failed for a reason other than infeasibility.
    #[error(transparent)]
    Lp(#[from] LpError),
}

impl StnError {
    /// Retrieves the stable [`StnErrorCode`] for this error.
    #[must_use]
    pub const fn code(&self) -> StnErrorCode {
        match self {
            Self::UnknownVertex(_) => StnErrorCode::UnknownVertex,
            Self::DuplicateContingentParent { .. } => StnErrorCode::DuplicateContingentParent,
            Self::MissingEdge { .. } => StnErrorCode::MissingEdge,
            Self::InvalidDistribution(_) => StnErrorCode::InvalidDistribution,
            Self::Lp(_) => StnErrorCode::LpSolverFailed,
        }
    }
}

/// Convenient alias for results returned by [`crate::Stn`] operations.
pub type StnResult<T> = Result<T, StnError>;
