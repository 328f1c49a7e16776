//! Optional passes applied to the contracted graph, in this order:
//! hide, split agents, transitive reduction.

use super::contraction::{ContextKey, ContractedGraph, NodeInfo};
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use simprov_id::{NodeId, ProvKind};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Remove hidden nodes. Synthetic activities go when the activity they
/// represent is hidden.
pub(crate) fn hide_nodes(graph: &mut ContractedGraph, hidden: &BTreeSet<NodeId>) -> usize {
    let doomed: Vec<NodeId> = graph
        .topology
        .nodes()
        .filter(|node| {
            hidden.contains(node)
                || graph
                    .info
                    .get(node)
                    .and_then(|info| info.represents)
                    .is_some_and(|represented| hidden.contains(&represented))
        })
        .collect();
    for node in &doomed {
        graph.remove_node(*node);
    }
    debug!(removed = doomed.len(), "hidden nodes removed");
    doomed.len()
}

/// Give every (activity, agent) pairing its own agent node.
///
/// Returns the clone id to original agent id table. Agents no activity
/// points at are left alone.
pub(crate) fn split_agents(graph: &mut ContractedGraph) -> BTreeMap<NodeId, NodeId> {
    let mut clones = BTreeMap::new();
    for agent in graph.nodes_of_kind(ProvKind::Agent) {
        let activities: Vec<NodeId> =
            graph.topology.neighbors_directed(agent, Direction::Incoming).collect();
        if activities.is_empty() {
            continue;
        }
        let Some(info) = graph.info.get(&agent).cloned() else { continue };
        for activity in activities {
            let clone = NodeId::new();
            graph.add_node(
                clone,
                NodeInfo { key: ContextKey::Node(clone), represents: Some(agent), ..info.clone() },
            );
            graph.topology.add_edge(activity, clone, ());
            clones.insert(clone, agent);
        }
        graph.remove_node(agent);
    }
    debug!(clones = clones.len(), "agents split");
    clones
}

/// Minimal edge set with the same reachability as `graph`, which must be
/// acyclic. Every node is kept.
pub(crate) fn transitive_reduction(graph: &DiGraphMap<NodeId, ()>) -> DiGraphMap<NodeId, ()> {
    let mut reduced = DiGraphMap::with_capacity(graph.node_count(), graph.edge_count());
    for node in graph.nodes() {
        reduced.add_node(node);
    }
    for (source, target, _) in graph.all_edges() {
        let redundant = graph
            .neighbors_directed(source, Direction::Outgoing)
            .filter(|other| *other != target)
            .any(|other| has_path_connecting(graph, other, target, None));
        if !redundant {
            reduced.add_edge(source, target, ());
        }
    }
    reduced
}
