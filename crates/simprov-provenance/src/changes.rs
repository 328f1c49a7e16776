//! Dependency edits proposed against an existing activity.

use serde::{Deserialize, Serialize};
use simprov_id::NodeId;

/// A single edge in causal direction: `source` depends on `target`.
///
/// For an activity `A`, `A -> E` means `A` used `E` (or is associated with
/// agent `E`) and `E -> A` means `A` generated `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: NodeId,
    pub target: NodeId,
}

impl DependencyEdge {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }

    pub fn as_pair(&self) -> (NodeId, NodeId) {
        (self.source, self.target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChanges {
    #[serde(default)]
    pub added: Vec<DependencyEdge>,
    #[serde(default)]
    pub removed: Vec<DependencyEdge>,
}

impl DependencyChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, source: NodeId, target: NodeId) -> Self {
        self.added.push(DependencyEdge::new(source, target));
        self
    }

    pub fn remove(mut self, source: NodeId, target: NodeId) -> Self {
        self.removed.push(DependencyEdge::new(source, target));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
