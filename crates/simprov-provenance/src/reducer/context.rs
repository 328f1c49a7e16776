//! Discovery of a maximal region of repeated same-named activity.

use super::contraction::{ContextKey, WorkingGraph};
use crate::error::{ProvenanceError, Result};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use simprov_id::{NodeId, ProvKind};
use std::collections::{HashMap, HashSet, VecDeque};

/// Breadth-first spanning tree over outgoing edges.
#[derive(Debug, Clone)]
pub(crate) struct SpanningTree {
    root: NodeId,
    order: Vec<NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl SpanningTree {
    pub fn breadth_first(graph: &DiGraphMap<NodeId, ()>, root: NodeId) -> Self {
        let mut order = vec![root];
        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut seen = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            for next in graph.neighbors_directed(node, Direction::Outgoing) {
                if seen.insert(next) {
                    children.entry(node).or_default().push(next);
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        Self { root, order, children }
    }

    /// Nodes in breadth-first order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// `node` and every tree descendant of it.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut nodes = vec![node];
        let mut index = 0;
        while index < nodes.len() {
            if let Some(children) = self.children.get(&nodes[index]) {
                nodes.extend(children.iter().copied());
            }
            index += 1;
        }
        nodes
    }

    /// Drop `removed` and everything only reachable through them.
    pub fn prune(&mut self, removed: &HashSet<NodeId>) {
        if removed.contains(&self.root) {
            self.order.clear();
            self.children.clear();
            return;
        }
        let mut order = vec![self.root];
        let mut children = HashMap::new();
        let mut queue = VecDeque::from([self.root]);
        while let Some(node) = queue.pop_front() {
            let Some(kids) = self.children.get(&node) else { continue };
            let kept: Vec<NodeId> = kids.iter().copied().filter(|kid| !removed.contains(kid)).collect();
            order.extend(kept.iter().copied());
            queue.extend(kept.iter().copied());
            if !kept.is_empty() {
                children.insert(node, kept);
            }
        }
        self.order = order;
        self.children = children;
    }

    /// Hang the current tree under a new root.
    pub fn graft(&mut self, root: NodeId) {
        self.children.insert(root, vec![self.root]);
        self.order.insert(0, root);
        self.root = root;
    }
}

#[derive(Debug, Clone)]
struct Pushed {
    node: NodeId,
    key: Option<ContextKey>,
}

/// Nodes collected while walking one context.
///
/// Entity keys stay registered after their last node is popped; the
/// signature check compares key sets, not populations.
#[derive(Debug, Default)]
pub(crate) struct GraphContext {
    activity: Option<String>,
    activity_id: Option<NodeId>,
    entities: HashMap<ContextKey, Vec<NodeId>>,
    pushed: Vec<Pushed>,
    members: HashSet<NodeId>,
}

impl GraphContext {
    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    /// The first activity of the context; the contracted activity takes
    /// its id.
    pub fn activity_id(&self) -> Option<NodeId> {
        self.activity_id
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    pub fn len(&self) -> usize {
        self.pushed.len()
    }

    /// Members in the order they joined.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.pushed.iter().map(|pushed| pushed.node).collect()
    }

    pub fn keys(&self) -> HashSet<ContextKey> {
        self.entities.keys().cloned().collect()
    }

    fn push_activity(&mut self, node: NodeId) {
        self.pushed.push(Pushed { node, key: None });
        self.members.insert(node);
    }

    fn push_entity(&mut self, key: ContextKey, node: NodeId) {
        self.entities.entry(key.clone()).or_default().push(node);
        self.pushed.push(Pushed { node, key: Some(key) });
        self.members.insert(node);
    }

    fn pop(&mut self) -> Option<NodeId> {
        let pushed = self.pushed.pop()?;
        self.members.remove(&pushed.node);
        if let Some(nodes) = pushed.key.and_then(|key| self.entities.get_mut(&key)) {
            nodes.retain(|node| *node != pushed.node);
        }
        Some(pushed.node)
    }
}

/// Walk outward from frontier node `start` and collect the largest region
/// that repeats the first activity reached.
///
/// Entities and agents that a differently named activity depends on are
/// flagged and end the walk along their branch. An activity whose
/// neighbour keys differ from the keys collected so far is dropped
/// together with its subtree.
pub(crate) fn discover_context(working: &mut WorkingGraph, start: NodeId) -> Result<GraphContext> {
    let tree = build_tree(working, start)?;
    let mut context = GraphContext::default();
    let mut stack: Vec<NodeId> = tree.order().iter().rev().copied().collect();
    let mut pending: HashSet<NodeId> = tree.order().iter().copied().collect();

    while let Some(node) = stack.pop() {
        if !pending.remove(&node) {
            continue;
        }
        let info = working.info(node)?;
        let kind = info.kind;
        let name = info.name.clone();
        let key = info.key.clone();

        if !context.contains(node) {
            if kind == ProvKind::Activity {
                context.push_activity(node);
                if context.activity.is_none() {
                    context.activity = Some(name);
                    context.activity_id = Some(node);
                    continue;
                }
            } else {
                context.push_entity(key, node);
            }
        }

        let Some(activity) = context.activity.as_deref() else { continue };
        let cut = if kind == ProvKind::Activity {
            if working.neighbour_keys(node) != context.keys() {
                context.pop();
                true
            } else {
                false
            }
        } else {
            let foreign = working
                .dependent_activity_names(node)
                .any(|dependent| dependent != activity);
            if foreign {
                working.flagged.insert(node);
            }
            working.flagged.contains(&node)
        };
        if cut {
            for dropped in tree.subtree(node) {
                pending.remove(&dropped);
            }
        }
    }

    let Some(first) = context.activity_id else {
        return Err(ProvenanceError::invalid_context(format!(
            "no activity reachable from {start}"
        )));
    };
    // Entities generated alongside the walked one are outputs of the same
    // occurrence; the tree never reaches them.
    let siblings: Vec<NodeId> = working
        .topology
        .neighbors_directed(first, Direction::Incoming)
        .filter(|node| !context.contains(*node))
        .collect();
    for sibling in siblings {
        let key = working.info(sibling)?.key.clone();
        context.push_entity(key, sibling);
    }
    Ok(context)
}

fn build_tree(working: &WorkingGraph, start: NodeId) -> Result<SpanningTree> {
    if working.info(start)?.is_activity() {
        return activity_tree(working, start);
    }
    let root = working.first_successor_activity(start).ok_or_else(|| {
        ProvenanceError::invalid_context(format!("{start} has no successor activity"))
    })?;
    let mut tree = activity_tree(working, root)?;
    tree.graft(start);
    Ok(tree)
}

/// Spanning tree from `root` without activities named differently from it.
fn activity_tree(working: &WorkingGraph, root: NodeId) -> Result<SpanningTree> {
    let name = working.info(root)?.name.clone();
    let mut tree = SpanningTree::breadth_first(&working.topology, root);
    let foreign: HashSet<NodeId> = tree
        .order()
        .iter()
        .copied()
        .filter(|node| *node != root)
        .filter(|node| {
            working
                .info(*node)
                .is_ok_and(|info| info.is_activity() && info.name != name)
        })
        .collect();
    tree.prune(&foreign);
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> NodeId {
        NodeId::from_u128(n)
    }

    #[test]
    fn spanning_tree_prunes_branches_through_removed_nodes() {
        let mut graph = DiGraphMap::new();
        graph.add_edge(id(1), id(2), ());
        graph.add_edge(id(1), id(3), ());
        graph.add_edge(id(2), id(4), ());
        graph.add_edge(id(3), id(4), ());
        graph.add_edge(id(4), id(5), ());

        let mut tree = SpanningTree::breadth_first(&graph, id(1));
        assert_eq!(tree.order(), [id(1), id(2), id(3), id(4), id(5)]);
        assert_eq!(tree.subtree(id(2)), vec![id(2), id(4), id(5)]);

        tree.prune(&HashSet::from([id(2)]));
        assert_eq!(tree.order(), [id(1), id(3)]);

        tree.graft(id(9));
        assert_eq!(tree.order(), [id(9), id(1), id(3)]);
    }

    #[test]
    fn popped_entities_keep_their_key() {
        let mut context = GraphContext::default();
        context.push_activity(id(1));
        context.push_entity(ContextKey::Node(id(2)), id(2));
        assert_eq!(context.len(), 2);
        assert_eq!(context.pop(), Some(id(2)));
        assert!(!context.contains(id(2)));
        assert!(context.keys().contains(&ContextKey::Node(id(2))));
    }
}
