//! Working and output graphs of the contraction loop, and the contraction
//! of one discovered context into a single synthetic activity.

use super::context::GraphContext;
use crate::error::{ProvenanceError, Result};
use crate::graph::ProvenanceGraph;
use crate::types::{PrimaryKey, ProvNode};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use simprov_id::{NodeId, ProvKind};
use std::collections::{HashMap, HashSet};

/// Key under which a node is recorded in a context's entity table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ContextKey {
    Primary(PrimaryKey),
    Node(NodeId),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeInfo {
    pub kind: ProvKind,
    pub name: String,
    pub key: ContextKey,
    /// Original node a synthetic activity or agent clone stands for.
    pub represents: Option<NodeId>,
}

impl NodeInfo {
    fn from_node(node: &ProvNode) -> Self {
        let key = match node {
            ProvNode::Entity(entity) => entity
                .primary_key
                .clone()
                .map(ContextKey::Primary)
                .unwrap_or(ContextKey::Node(entity.id)),
            other => ContextKey::Node(other.id()),
        };
        Self { kind: node.kind(), name: node.name().to_string(), key, represents: None }
    }

    pub fn is_activity(&self) -> bool {
        self.kind == ProvKind::Activity
    }
}

/// Mutable copy of the source topology consumed by the contraction loop.
#[derive(Debug)]
pub(crate) struct WorkingGraph {
    pub topology: DiGraphMap<NodeId, ()>,
    info: HashMap<NodeId, NodeInfo>,
    /// Nodes shared across differently named activities or already kept as
    /// a boundary. Sticky for the whole reduction.
    pub flagged: HashSet<NodeId>,
}

impl WorkingGraph {
    pub fn from_source(source: &ProvenanceGraph) -> Self {
        let info = source.nodes().map(|node| (node.id(), NodeInfo::from_node(node))).collect();
        Self { topology: source.topology().clone(), info, flagged: HashSet::new() }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.topology.contains_node(node)
    }

    pub fn info(&self, node: NodeId) -> Result<&NodeInfo> {
        self.info
            .get(&node)
            .ok_or_else(|| ProvenanceError::invalid_context(format!("node {node} has no attributes")))
    }

    /// Nodes nothing else in the working graph depends on.
    pub fn frontier(&self) -> Vec<NodeId> {
        self.topology
            .nodes()
            .filter(|node| self.in_degree(*node) == 0)
            .collect()
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.topology.neighbors_directed(node, Direction::Incoming).count()
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.topology.neighbors_directed(node, Direction::Outgoing).count()
    }

    pub fn first_successor_activity(&self, node: NodeId) -> Option<NodeId> {
        self.topology
            .neighbors_directed(node, Direction::Outgoing)
            .find(|succ| self.info.get(succ).is_some_and(NodeInfo::is_activity))
    }

    /// Names of the activities pointing at `node`: those that used it or
    /// are associated with it.
    pub fn dependent_activity_names(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.topology
            .neighbors_directed(node, Direction::Incoming)
            .filter_map(|pred| self.info.get(&pred))
            .filter(|info| info.is_activity())
            .map(|info| info.name.as_str())
    }

    pub fn neighbour_keys(&self, node: NodeId) -> HashSet<ContextKey> {
        self.topology
            .neighbors_directed(node, Direction::Outgoing)
            .chain(self.topology.neighbors_directed(node, Direction::Incoming))
            .filter_map(|other| self.info.get(&other))
            .map(|info| info.key.clone())
            .collect()
    }

    pub fn remove_nodes<'a>(&mut self, nodes: impl IntoIterator<Item = &'a NodeId>) {
        for node in nodes {
            self.topology.remove_node(*node);
        }
    }

    /// Drop every node left without edges.
    pub fn remove_isolated(&mut self) -> usize {
        let isolated: Vec<NodeId> = self
            .topology
            .nodes()
            .filter(|node| self.in_degree(*node) == 0 && self.out_degree(*node) == 0)
            .collect();
        self.remove_nodes(&isolated);
        isolated.len()
    }
}

/// The accumulating output of the contraction loop.
#[derive(Debug, Default)]
pub(crate) struct ContractedGraph {
    pub topology: DiGraphMap<NodeId, ()>,
    pub info: HashMap<NodeId, NodeInfo>,
}

impl ContractedGraph {
    pub fn add_node(&mut self, node: NodeId, info: NodeInfo) {
        self.topology.add_node(node);
        self.info.insert(node, info);
    }

    pub fn remove_node(&mut self, node: NodeId) -> bool {
        self.info.remove(&node);
        self.topology.remove_node(node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.topology.contains_node(node)
    }

    pub fn nodes_of_kind(&self, kind: ProvKind) -> Vec<NodeId> {
        self.topology
            .nodes()
            .filter(|node| self.info.get(node).is_some_and(|info| info.kind == kind))
            .collect()
    }

    /// Union `other` into `self`; attributes of shared nodes are overwritten.
    pub fn merge(&mut self, other: ContractedGraph) {
        for node in other.topology.nodes() {
            self.topology.add_node(node);
        }
        for (source, target, _) in other.topology.all_edges() {
            self.topology.add_edge(source, target, ());
        }
        self.info.extend(other.info);
    }
}

/// One context collapsed into a synthetic activity plus its boundary.
#[derive(Debug)]
pub(crate) struct ContractedContext {
    pub graph: ContractedGraph,
    pub activity_id: NodeId,
    /// Context members that did not survive as boundary nodes.
    pub absorbed: Vec<NodeId>,
}

/// Collapse the subgraph induced by `context` into one activity.
///
/// Entity/agent members without an outgoing edge inside the subgraph are
/// inputs; entity/agent members touching the subgraph through exactly one
/// outgoing edge are outputs. Everything else is absorbed. Boundary nodes
/// are flagged so later contexts stop at them.
pub(crate) fn contract_context(
    working: &mut WorkingGraph,
    context: &GraphContext,
) -> Result<ContractedContext> {
    let (name, represented) = match (context.activity(), context.activity_id()) {
        (Some(name), Some(id)) => (name.to_string(), id),
        _ => return Err(ProvenanceError::invalid_context("context has no activity")),
    };
    let members = context.nodes();
    let member_set: HashSet<NodeId> = members.iter().copied().collect();

    let activity_id = NodeId::new();
    let mut graph = ContractedGraph::default();
    graph.add_node(
        activity_id,
        NodeInfo {
            kind: ProvKind::Activity,
            name,
            key: ContextKey::Node(activity_id),
            represents: Some(represented),
        },
    );

    for &node in &members {
        let info = working.info(node)?.clone();
        if info.is_activity() {
            continue;
        }
        let outgoing = working
            .topology
            .neighbors_directed(node, Direction::Outgoing)
            .filter(|other| member_set.contains(other))
            .count();
        let incoming = working
            .topology
            .neighbors_directed(node, Direction::Incoming)
            .filter(|other| member_set.contains(other))
            .count();
        if outgoing == 0 {
            graph.add_node(node, info);
            graph.topology.add_edge(activity_id, node, ());
            working.flagged.insert(node);
        } else if outgoing == 1 && incoming == 0 {
            graph.add_node(node, info);
            graph.topology.add_edge(node, activity_id, ());
            working.flagged.insert(node);
        }
    }

    let absorbed = members.into_iter().filter(|node| !graph.contains(*node)).collect();
    Ok(ContractedContext { graph, activity_id, absorbed })
}
