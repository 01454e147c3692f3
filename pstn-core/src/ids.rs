//! Stable identifiers for timepoints and agents.

/// Identifier for a timepoint (vertex) in a temporal network.
///
/// Id `0` is reserved for the Z reference timepoint, against which every
/// other timepoint's bounds are ultimately expressed.
///
/// # Examples
/// ```
/// use pstn_core::VertexId;
///
/// let id = VertexId::new(4);
/// assert_eq!(id.get(), 4);
/// assert!(!id.is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(u32);

impl VertexId {
    /// The reserved Z reference timepoint.
    pub const ZERO: Self = Self(0);

    /// Creates a new vertex identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Returns the underlying numeric identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Returns `true` when this is the Z reference timepoint.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Identifier for the agent that owns a timepoint.
///
/// # Examples
/// ```
/// use pstn_core::AgentId;
///
/// let id = AgentId::new(2);
/// assert_eq!(id.get(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Returns the underlying numeric identifier.
    #[rustfmt::skip]
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }
}
