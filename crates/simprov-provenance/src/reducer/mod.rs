//! Coarsening of a provenance graph for display.
//!
//! Reduction contracts every occurrence of an activity (the activity plus
//! all intermediate entity versions it churned through) into one synthetic
//! activity whose only neighbours are the entities and agents crossing the
//! occurrence boundary. Hiding, agent splitting and transitive reduction
//! are optional passes on the contracted result.

mod context;
mod contraction;
mod passes;

use crate::error::{ProvenanceError, Result};
use crate::graph::ProvenanceGraph;
use crate::types::{Activity, Agent, ProvNode};
use context::discover_context;
use contraction::{ContractedGraph, NodeInfo, WorkingGraph, contract_context};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use simprov_id::{NodeId, ProvKind};
use simprov_observability::spans;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Toggles for the optional reduction passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceOptions {
    pub reduce_transitives: bool,
    pub hide_nodes: bool,
    pub split_agents: bool,
}

impl ReduceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reduce_transitives(mut self, enabled: bool) -> Self {
        self.reduce_transitives = enabled;
        self
    }

    pub fn with_hide_nodes(mut self, enabled: bool) -> Self {
        self.hide_nodes = enabled;
        self
    }

    pub fn with_split_agents(mut self, enabled: bool) -> Self {
        self.split_agents = enabled;
        self
    }
}

/// Result of a reduction together with the agent clone table.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub graph: ProvenanceGraph,
    /// Clone id to original agent id, filled when agents were split.
    pub agent_clones: BTreeMap<NodeId, NodeId>,
}

impl Reduction {
    /// The original agent a split clone stands for.
    pub fn original_agent(&self, clone: NodeId) -> Option<NodeId> {
        self.agent_clones.get(&clone).copied()
    }
}

/// Borrows a source graph read-only and produces reduced copies of it.
#[derive(Debug, Clone, Copy)]
pub struct GraphReducer<'a> {
    source: &'a ProvenanceGraph,
}

impl<'a> GraphReducer<'a> {
    pub fn new(source: &'a ProvenanceGraph) -> Self {
        Self { source }
    }

    pub fn reduce(&self, options: ReduceOptions) -> Result<ProvenanceGraph> {
        self.run(options).map(|reduction| reduction.graph)
    }

    pub fn run(&self, options: ReduceOptions) -> Result<Reduction> {
        let span =
            spans::reduce_graph(options.reduce_transitives, options.hide_nodes, options.split_agents);
        let _guard = span.enter();

        if petgraph::algo::is_cyclic_directed(self.source.topology()) {
            return Err(ProvenanceError::invalid_context("cannot reduce a cyclic graph"));
        }

        let mut contracted = self.contract()?;
        if options.hide_nodes {
            passes::hide_nodes(&mut contracted, self.source.hidden_nodes());
        }
        let agent_clones = if options.split_agents {
            passes::split_agents(&mut contracted)
        } else {
            BTreeMap::new()
        };
        if options.reduce_transitives {
            contracted.topology = passes::transitive_reduction(&contracted.topology);
        }

        let graph = self.rebuild(&contracted, &agent_clones)?;
        info!(
            source_nodes = self.source.node_count(),
            activities = graph.activities().count(),
            nodes = graph.node_count(),
            "graph reduced"
        );
        Ok(Reduction { graph, agent_clones })
    }

    /// Run the frontier loop until the working graph is empty.
    fn contract(&self) -> Result<ContractedGraph> {
        let mut working = WorkingGraph::from_source(self.source);
        let mut reduced = ContractedGraph::default();
        let mut pass = 0usize;

        loop {
            let frontier = working.frontier();
            if frontier.is_empty() {
                break;
            }
            pass += 1;
            let span = spans::contraction_pass(pass, frontier.len());
            let _guard = span.enter();

            for node in frontier {
                if !working.contains(node) {
                    continue;
                }
                let info = working.info(node)?;
                if !info.is_activity() && working.first_successor_activity(node).is_none() {
                    reduced.add_node(node, info.clone());
                    working.remove_nodes(&[node]);
                    continue;
                }

                let context = discover_context(&mut working, node)?;
                let contracted = contract_context(&mut working, &context)?;
                debug!(
                    activity = context.activity().unwrap_or_default(),
                    members = context.len(),
                    absorbed = contracted.absorbed.len(),
                    synthetic = %contracted.activity_id,
                    "context contracted"
                );
                working.remove_nodes(&contracted.absorbed);
                reduced.merge(contracted.graph);
                working.remove_isolated();
            }
        }
        debug!(passes = pass, nodes = reduced.topology.node_count(), "contraction finished");
        Ok(reduced)
    }

    /// Turn the contracted topology back into a provenance graph, resolving
    /// every node through the source graph.
    fn rebuild(
        &self,
        reduced: &ContractedGraph,
        agent_clones: &BTreeMap<NodeId, NodeId>,
    ) -> Result<ProvenanceGraph> {
        let order = petgraph::algo::toposort(&reduced.topology, None).map_err(|cycle| {
            ProvenanceError::invalid_context(format!(
                "reduced graph has a cycle through {}",
                cycle.node_id()
            ))
        })?;

        let mut graph = ProvenanceGraph::new();
        // Causes come last in effect-to-cause order; walk backwards so
        // earlier activities are added first.
        for node in order.iter().rev().copied() {
            let Some(info) = reduced.info.get(&node) else { continue };
            if info.is_activity() {
                let activity = self.rebuild_activity(reduced, node, info, agent_clones)?;
                graph.add_activity(activity);
            }
        }

        for node in reduced.topology.nodes() {
            let isolated = reduced.topology.neighbors_directed(node, Direction::Incoming).next().is_none()
                && reduced.topology.neighbors_directed(node, Direction::Outgoing).next().is_none();
            if !isolated {
                continue;
            }
            match self.source.node(node) {
                Some(ProvNode::Entity(entity)) => graph.insert_entity(entity.clone()),
                Some(ProvNode::Agent(agent)) => graph.insert_agent(agent.clone()),
                _ => {}
            }
        }

        graph.set_user_generated_dependencies(self.source.user_generated_dependencies().to_vec());
        Ok(graph)
    }

    fn rebuild_activity(
        &self,
        reduced: &ContractedGraph,
        node: NodeId,
        info: &NodeInfo,
        agent_clones: &BTreeMap<NodeId, NodeId>,
    ) -> Result<Activity> {
        let mut activity = Activity::with_id(info.represents.unwrap_or(node), info.name.clone());
        for effect in reduced.topology.neighbors_directed(node, Direction::Incoming) {
            if let Some(entity) = self.source.entity(effect) {
                activity.generated_entities.push(entity.clone());
            }
        }
        for cause in reduced.topology.neighbors_directed(node, Direction::Outgoing) {
            if let Some(original) = agent_clones.get(&cause) {
                let agent = self
                    .source
                    .agent(*original)
                    .ok_or_else(|| ProvenanceError::not_found(*original, ProvKind::Agent))?;
                activity.associated_agents.push(Agent { id: cause, ..agent.clone() });
                continue;
            }
            match self.source.node(cause) {
                Some(ProvNode::Entity(entity)) => activity.used_entities.push(entity.clone()),
                Some(ProvNode::Agent(agent)) => activity.associated_agents.push(agent.clone()),
                _ => {}
            }
        }
        Ok(activity)
    }
}

/// Reduce `graph` with the given pass toggles.
pub fn reduce(
    graph: &ProvenanceGraph,
    reduce_transitives: bool,
    hide_nodes: bool,
    split_agents: bool,
) -> Result<ProvenanceGraph> {
    let options = ReduceOptions { reduce_transitives, hide_nodes, split_agents };
    GraphReducer::new(graph).reduce(options)
}
