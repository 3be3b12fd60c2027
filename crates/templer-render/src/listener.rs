//! Identifiers and listeners of the change graph
//!
//! Signals store plain [`Listener`] values rather than callbacks. Ids are
//! allocated monotonically and never reused, so a listener that outlived its
//! target resolves to nothing and is skipped.

use std::fmt;

/// Identifies a [`Manifest`](crate::Manifest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestId(u64);

/// Identifies a [`RenderUnit`](crate::RenderUnit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

/// A context node: position `position` in the chain of unit `unit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub unit: UnitId,
    pub position: usize,
}

/// Something notified when a signal fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listener {
    /// Re-parse and re-render the whole manifest
    Manifest(ManifestId),
    /// Recompute a context node and propagate if its mapping changed
    Node(NodeRef),
    /// Re-render a unit
    Unit(UnitId),
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manifest#{}", self.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::Manifest(id) => write!(f, "{}", id),
            Listener::Node(node) => write!(f, "{}/node#{}", node.unit, node.position),
            Listener::Unit(id) => write!(f, "{}", id),
        }
    }
}

/// Hands out ids that are never reused
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manifest(&mut self) -> ManifestId {
        ManifestId(self.bump())
    }

    pub fn unit(&mut self) -> UnitId {
        UnitId(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}
