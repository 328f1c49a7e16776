//! The authoritative provenance store.
//!
//! Edges point from an effect toward one of its causes: a generated entity
//! points at the activity that generated it, and an activity points at every
//! entity it used and every agent associated with it. Following edges
//! therefore walks backward through causal history, and nodes nothing
//! depends on have in-degree zero.

use crate::changes::{DependencyChanges, DependencyEdge};
use crate::error::{ProvenanceError, Result};
use crate::types::{
    Activity, ActivityNode, Agent, Attributes, Entity, NodeView, PrimaryKey, ProvNode,
};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use simprov_id::{NodeId, ProvKind};
use simprov_observability::spans;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ProvenanceGraph {
    graph: DiGraphMap<NodeId, ()>,
    node_map: HashMap<NodeId, ProvNode>,
    last_entities_map: HashMap<PrimaryKey, NodeId>,
    hidden_nodes: BTreeSet<NodeId>,
    user_generated_dependencies: Vec<(NodeId, NodeId)>,
}

/// Role an edited edge plays for the activity it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DependencyRole {
    Used(NodeId),
    Associated(NodeId),
    Generated(NodeId),
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integrate a normalized activity.
    ///
    /// Used entities are resolved against the graph: a known id is reused,
    /// otherwise the current version of the entity's primary key stands in
    /// for it, otherwise the entity becomes a new node. Generated entities
    /// must be new and each becomes the current version of its key.
    pub fn chain(&mut self, activity: Activity) -> Result<NodeId> {
        let span = spans::chain_activity(&activity.name);
        let _guard = span.enter();

        self.check_incoming(&activity)?;
        let Activity { id, name, used_entities, generated_entities, associated_agents } = activity;
        let mut node = ActivityNode::new(id, name);

        for agent in associated_agents {
            node.agents.push(agent.id);
            if !self.node_map.contains_key(&agent.id) {
                self.insert_node(ProvNode::Agent(agent));
            }
        }
        for entity in used_entities {
            let resolved = self.resolve_used_entity(entity);
            node.used.push(resolved);
        }
        for entity in generated_entities {
            node.generated.push(entity.id);
            if let Some(key) = &entity.primary_key {
                if let Some(previous) = self.last_entities_map.insert(key.clone(), entity.id) {
                    debug!(primary_key = %key, previous = %previous, current = %entity.id, "entity version superseded");
                }
            }
            self.insert_node(ProvNode::Entity(entity));
        }

        debug!(
            activity = %node.name,
            id = %id,
            used = node.used.len(),
            generated = node.generated.len(),
            agents = node.agents.len(),
            "activity chained"
        );
        self.insert_activity_node(node);
        Ok(id)
    }

    /// Register an activity and its nodes verbatim, without version
    /// resolution. Nodes already present keep their stored value.
    pub fn add_activity(&mut self, activity: Activity) -> NodeId {
        let Activity { id, name, used_entities, generated_entities, associated_agents } = activity;
        let mut node = ActivityNode::new(id, name);

        for agent in associated_agents {
            node.agents.push(agent.id);
            self.insert_if_absent(ProvNode::Agent(agent));
        }
        for entity in used_entities {
            node.used.push(entity.id);
            self.insert_if_absent(ProvNode::Entity(entity));
        }
        for entity in generated_entities {
            node.generated.push(entity.id);
            if let Some(key) = &entity.primary_key {
                self.last_entities_map.insert(key.clone(), entity.id);
            }
            self.insert_if_absent(ProvNode::Entity(entity));
        }
        self.insert_activity_node(node);
        id
    }

    /// Register an entity that no activity refers to.
    pub fn insert_entity(&mut self, entity: Entity) {
        self.insert_if_absent(ProvNode::Entity(entity));
    }

    /// Register an agent that no activity refers to.
    pub fn insert_agent(&mut self, agent: Agent) {
        self.insert_if_absent(ProvNode::Agent(agent));
    }

    /// Apply hand-made dependency edits to an activity.
    ///
    /// Every edge must connect `activity_id` with an entity or agent. The
    /// whole change set is validated before anything is touched, so a
    /// rejected edit leaves the graph exactly as it was.
    pub fn update_activity_dependencies(
        &mut self,
        activity_id: NodeId,
        changes: &DependencyChanges,
    ) -> Result<()> {
        if !self.is_activity(activity_id) {
            return Err(ProvenanceError::not_found(activity_id, ProvKind::Activity));
        }
        if changes.is_empty() {
            return Ok(());
        }
        let removed = changes
            .removed
            .iter()
            .map(|edge| self.dependency_role(activity_id, edge))
            .collect::<Result<Vec<_>>>()?;
        let added = changes
            .added
            .iter()
            .map(|edge| self.dependency_role(activity_id, edge))
            .collect::<Result<Vec<_>>>()?;
        if self.would_cycle(changes) {
            warn!(activity_id = %activity_id, "rejected dependency change: cycle");
            return Err(ProvenanceError::CycleDetected { activity_id });
        }

        for (edge, role) in changes.removed.iter().zip(removed) {
            self.graph.remove_edge(edge.source, edge.target);
            self.user_generated_dependencies.retain(|pair| *pair != edge.as_pair());
            if let Some(ProvNode::Activity(node)) = self.node_map.get_mut(&activity_id) {
                match role {
                    DependencyRole::Used(other) => node.used.retain(|id| *id != other),
                    DependencyRole::Associated(other) => node.agents.retain(|id| *id != other),
                    DependencyRole::Generated(other) => node.generated.retain(|id| *id != other),
                }
            }
        }
        for (edge, role) in changes.added.iter().zip(added) {
            if self.graph.add_edge(edge.source, edge.target, ()).is_none()
                && !self.user_generated_dependencies.contains(&edge.as_pair())
            {
                self.user_generated_dependencies.push(edge.as_pair());
            }
            if let Some(ProvNode::Activity(node)) = self.node_map.get_mut(&activity_id) {
                let (list, other) = match role {
                    DependencyRole::Used(other) => (&mut node.used, other),
                    DependencyRole::Associated(other) => (&mut node.agents, other),
                    DependencyRole::Generated(other) => (&mut node.generated, other),
                };
                if !list.contains(&other) {
                    list.push(other);
                }
            }
        }
        debug!(
            activity_id = %activity_id,
            added = changes.added.len(),
            removed = changes.removed.len(),
            "activity dependencies updated"
        );
        Ok(())
    }

    /// Whether applying `changes` to the current graph would form a cycle.
    pub fn would_cycle(&self, changes: &DependencyChanges) -> bool {
        let mut hypothetical = self.graph.clone();
        for edge in &changes.removed {
            hypothetical.remove_edge(edge.source, edge.target);
        }
        for edge in &changes.added {
            hypothetical.add_edge(edge.source, edge.target, ());
        }
        petgraph::algo::toposort(&hypothetical, None).is_err()
    }

    /// Merge `changes` into an entity's attributes in place.
    pub fn update_entity_attributes(&mut self, entity_id: NodeId, changes: Attributes) -> Result<()> {
        match self.node_map.get_mut(&entity_id) {
            Some(ProvNode::Entity(entity)) => {
                entity.attributes.extend(changes);
                Ok(())
            }
            _ => Err(ProvenanceError::not_found(entity_id, ProvKind::Entity)),
        }
    }

    /// Set the hidden flag on `node_id` and everything causally upstream
    /// of it, stopping at nodes that already carry the flag.
    pub fn propagate_visibility(&mut self, node_id: NodeId, hidden: bool) -> Result<()> {
        let kind = self
            .node_map
            .get(&node_id)
            .map(ProvNode::kind)
            .ok_or(ProvenanceError::UnknownNode { node_id })?;
        self.set_hidden(node_id, hidden);
        let mut stack = vec![node_id];
        let mut changed = 1usize;
        while let Some(current) = stack.pop() {
            let causes: Vec<NodeId> =
                self.graph.neighbors_directed(current, Direction::Outgoing).collect();
            for cause in causes {
                if self.hidden_nodes.contains(&cause) != hidden {
                    self.set_hidden(cause, hidden);
                    changed += 1;
                    stack.push(cause);
                }
            }
        }
        debug!(node_id = %node_id, kind = %kind, hidden, changed, "visibility propagated");
        Ok(())
    }

    pub fn node_data(&self, node_id: NodeId) -> Result<NodeView> {
        let node = self
            .node_map
            .get(&node_id)
            .ok_or(ProvenanceError::UnknownNode { node_id })?;
        let (attributes, primary_key) = match node {
            ProvNode::Entity(entity) => (entity.attributes.clone(), entity.primary_key.clone()),
            ProvNode::Agent(agent) => (agent.attributes.clone(), None),
            ProvNode::Activity(_) => (Attributes::new(), None),
        };
        let user_generated_edges = match node {
            ProvNode::Activity(_) => self
                .user_generated_dependencies
                .iter()
                .filter_map(|(source, target)| {
                    if *source == node_id {
                        Some(*target)
                    } else if *target == node_id {
                        Some(*source)
                    } else {
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(NodeView {
            id: node_id,
            kind: node.kind(),
            name: node.name().to_string(),
            attributes,
            primary_key,
            hidden: self.hidden_nodes.contains(&node_id),
            user_generated_edges,
        })
    }

    pub fn is_entity(&self, node_id: NodeId) -> bool {
        matches!(self.node_map.get(&node_id), Some(ProvNode::Entity(_)))
    }

    pub fn is_activity(&self, node_id: NodeId) -> bool {
        matches!(self.node_map.get(&node_id), Some(ProvNode::Activity(_)))
    }

    pub fn is_agent(&self, node_id: NodeId) -> bool {
        matches!(self.node_map.get(&node_id), Some(ProvNode::Agent(_)))
    }

    pub fn node(&self, node_id: NodeId) -> Option<&ProvNode> {
        self.node_map.get(&node_id)
    }

    pub fn entity(&self, node_id: NodeId) -> Option<&Entity> {
        self.node_map.get(&node_id).and_then(ProvNode::as_entity)
    }

    pub fn activity(&self, node_id: NodeId) -> Option<&ActivityNode> {
        self.node_map.get(&node_id).and_then(ProvNode::as_activity)
    }

    pub fn agent(&self, node_id: NodeId) -> Option<&Agent> {
        self.node_map.get(&node_id).and_then(ProvNode::as_agent)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &ProvNode> {
        self.graph.nodes().filter_map(|id| self.node_map.get(&id))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.nodes().filter_map(ProvNode::as_entity)
    }

    pub fn activities(&self) -> impl Iterator<Item = &ActivityNode> {
        self.nodes().filter_map(ProvNode::as_activity)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.nodes().filter_map(ProvNode::as_agent)
    }

    /// Edges as `(effect, cause)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.graph.all_edges().map(|(source, target, _)| (source, target))
    }

    pub fn contains_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.graph.contains_edge(source, target)
    }

    /// Nodes `node_id` points at (its direct causes).
    pub fn successors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(node_id, Direction::Outgoing)
    }

    /// Nodes pointing at `node_id` (its direct effects).
    pub fn predecessors(&self, node_id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.neighbors_directed(node_id, Direction::Incoming)
    }

    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// The most recently chained entity holding `key`.
    pub fn current_version(&self, key: &PrimaryKey) -> Option<&Entity> {
        self.last_entities_map.get(key).and_then(|id| self.entity(*id))
    }

    pub fn hidden_nodes(&self) -> &BTreeSet<NodeId> {
        &self.hidden_nodes
    }

    pub fn is_hidden(&self, node_id: NodeId) -> bool {
        self.hidden_nodes.contains(&node_id)
    }

    pub fn user_generated_dependencies(&self) -> &[(NodeId, NodeId)] {
        &self.user_generated_dependencies
    }

    pub(crate) fn set_user_generated_dependencies(&mut self, dependencies: Vec<(NodeId, NodeId)>) {
        self.user_generated_dependencies = dependencies;
    }

    pub(crate) fn topology(&self) -> &DiGraphMap<NodeId, ()> {
        &self.graph
    }

    /// Every id an activity brings must name one node of one kind, and
    /// ids already stored must keep their kind.
    fn check_incoming(&self, activity: &Activity) -> Result<()> {
        let clash = |node_id: NodeId| ProvenanceError::AlreadyChained { node_id };
        if self.node_map.contains_key(&activity.id) {
            return Err(clash(activity.id));
        }
        let mut claimed: HashMap<NodeId, ProvKind> =
            HashMap::from([(activity.id, ProvKind::Activity)]);
        let referenced = activity
            .associated_agents
            .iter()
            .map(|agent| (agent.id, ProvKind::Agent))
            .chain(activity.used_entities.iter().map(|entity| (entity.id, ProvKind::Entity)));
        for (node_id, kind) in referenced {
            if let Some(stored) = self.node_map.get(&node_id) {
                if stored.kind() != kind {
                    return Err(ProvenanceError::not_found(node_id, kind));
                }
            }
            if *claimed.entry(node_id).or_insert(kind) != kind {
                return Err(clash(node_id));
            }
        }
        for entity in &activity.generated_entities {
            if self.node_map.contains_key(&entity.id)
                || claimed.insert(entity.id, ProvKind::Entity).is_some()
            {
                return Err(clash(entity.id));
            }
        }
        Ok(())
    }

    fn resolve_used_entity(&mut self, entity: Entity) -> NodeId {
        if self.node_map.contains_key(&entity.id) {
            return entity.id;
        }
        if let Some(current) = entity
            .primary_key
            .as_ref()
            .and_then(|key| self.last_entities_map.get(key))
        {
            return *current;
        }
        let id = entity.id;
        if let Some(key) = &entity.primary_key {
            self.last_entities_map.insert(key.clone(), id);
        }
        self.insert_node(ProvNode::Entity(entity));
        id
    }

    fn dependency_role(&self, activity_id: NodeId, edge: &DependencyEdge) -> Result<DependencyRole> {
        let invalid = || ProvenanceError::InvalidDependency {
            activity_id,
            from: edge.source,
            to: edge.target,
        };
        let (other, uses) = if edge.source == activity_id && edge.target != activity_id {
            (edge.target, true)
        } else if edge.target == activity_id && edge.source != activity_id {
            (edge.source, false)
        } else {
            return Err(invalid());
        };
        match (self.node_map.get(&other), uses) {
            (None, _) => Err(ProvenanceError::UnknownNode { node_id: other }),
            (Some(ProvNode::Entity(_)), true) => Ok(DependencyRole::Used(other)),
            (Some(ProvNode::Agent(_)), true) => Ok(DependencyRole::Associated(other)),
            (Some(ProvNode::Entity(_)), false) => Ok(DependencyRole::Generated(other)),
            _ => Err(invalid()),
        }
    }

    fn insert_activity_node(&mut self, node: ActivityNode) {
        let id = node.id;
        self.graph.add_node(id);
        for generated in &node.generated {
            self.graph.add_edge(*generated, id, ());
        }
        for used in node.used.iter().chain(node.agents.iter()) {
            self.graph.add_edge(id, *used, ());
        }
        self.node_map.insert(id, ProvNode::Activity(node));
    }

    fn insert_node(&mut self, node: ProvNode) {
        let id = node.id();
        self.graph.add_node(id);
        self.node_map.insert(id, node);
    }

    fn insert_if_absent(&mut self, node: ProvNode) {
        if !self.node_map.contains_key(&node.id()) {
            self.insert_node(node);
        }
    }

    fn set_hidden(&mut self, node_id: NodeId, hidden: bool) {
        if hidden {
            self.hidden_nodes.insert(node_id);
        } else {
            self.hidden_nodes.remove(&node_id);
        }
    }
}
