use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

/// Identifies a node (an RDF term) within a tuple.
///
/// Node ids are 63-bit non-negative integers. The value `0` is reserved for [NodeId::UNBOUND],
/// which indicates that a variable is free in the given row.
#[derive(Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default)]
pub struct NodeId(u64);

impl NodeId {
    /// The sentinel that marks a column as unbound in a row.
    pub const UNBOUND: NodeId = NodeId(0);
    /// The smallest node id that refers to an actual node.
    pub const MIN: NodeId = NodeId(1);
    /// The largest valid node id.
    pub const MAX: NodeId = NodeId(u64::MAX >> 1);

    /// Returns the raw value of this id.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true if this id is the [NodeId::UNBOUND] sentinel.
    pub fn is_unbound(self) -> bool {
        self == Self::UNBOUND
    }

    /// Returns true if this id refers to an actual node.
    pub fn is_bound(self) -> bool {
        !self.is_unbound()
    }

    /// Returns the next node id, if any.
    pub fn next(self) -> Option<NodeId> {
        let next = self.0.checked_add(1)?;
        (next <= Self::MAX.0).then_some(NodeId(next))
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Node id {0} exceeds the 63-bit range.")]
pub struct InvalidNodeIdError(pub u64);

impl TryFrom<u64> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > Self::MAX.0 {
            return Err(InvalidNodeIdError(value));
        }
        Ok(Self(value))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_unbound() {
            f.write_str("_")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
