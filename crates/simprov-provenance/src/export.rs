//! Generic node-link view of a provenance graph.
//!
//! Downstream serializers (Cytoscape, DOT, PROV-JSON) start from this
//! shape; nothing here knows about any particular format.

use crate::graph::ProvenanceGraph;
use serde::{Deserialize, Serialize};
use simprov_id::{NodeId, ProvKind};
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: ProvKind,
    pub name: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLinkEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub user_generated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    pub nodes: Vec<NodeLinkNode>,
    pub edges: Vec<NodeLinkEdge>,
}

impl NodeLinkGraph {
    pub fn node(&self, id: NodeId) -> Option<&NodeLinkNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

impl ProvenanceGraph {
    /// Export using this graph's own hidden flags.
    pub fn to_node_link(&self) -> NodeLinkGraph {
        self.to_node_link_with_hidden(self.hidden_nodes())
    }

    /// Export with hidden flags taken from another graph, typically the
    /// source of a reduction.
    pub fn to_node_link_with_hidden(&self, hidden: &BTreeSet<NodeId>) -> NodeLinkGraph {
        let user_generated: HashSet<(NodeId, NodeId)> =
            self.user_generated_dependencies().iter().copied().collect();
        let nodes = self
            .nodes()
            .map(|node| NodeLinkNode {
                id: node.id(),
                kind: node.kind(),
                name: node.name().to_string(),
                hidden: hidden.contains(&node.id()),
            })
            .collect();
        let edges = self
            .edges()
            .map(|(source, target)| NodeLinkEdge {
                source,
                target,
                user_generated: user_generated.contains(&(source, target)),
            })
            .collect();
        NodeLinkGraph { nodes, edges }
    }
}
