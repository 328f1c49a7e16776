//! Shared, async access to a study.
//!
//! All mutations go through one write lock and every reduction or query
//! holds the read lock, so a reduction never observes a half-applied edit.

use crate::error::Result;
use crate::export::NodeLinkGraph;
use crate::graph::ProvenanceGraph;
use crate::reducer::ReduceOptions;
use crate::study::{Study, StudyConfig};
use crate::types::NodeView;
use async_trait::async_trait;
use serde_json::Value;
use simprov_id::NodeId;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

#[async_trait]
pub trait ProvenanceWriter: Send + Sync {
    /// Apply one raw study event.
    async fn add_event(&self, event: Value) -> Result<Option<NodeId>>;

    /// Apply an event, logging a failure instead of returning it.
    async fn add_event_with_logging(&self, event: Value, context: &str) {
        if let Err(err) = self.add_event(event).await {
            error!(context = %context, error = %err, "failed to record provenance event");
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryProvenanceStore {
    study: Arc<RwLock<Study>>,
}

impl InMemoryProvenanceStore {
    pub fn new() -> Self {
        Self::from_study(Study::default())
    }

    pub fn with_config(config: StudyConfig) -> Self {
        Self::from_study(Study::new(config))
    }

    pub fn from_study(study: Study) -> Self {
        Self { study: Arc::new(RwLock::new(study)) }
    }

    /// Reduce the current graph; the source is read-locked for the whole
    /// reduction.
    pub async fn reduce(&self, options: ReduceOptions) -> Result<ProvenanceGraph> {
        let study = self.study.read().await;
        study.reduce(options).map(|reduction| reduction.graph)
    }

    /// Recompute the study's cached reduced graph and export it with the
    /// source graph's hidden flags.
    pub async fn refresh_reduced(&self, options: Option<ReduceOptions>) -> Result<NodeLinkGraph> {
        let mut study = self.study.write().await;
        let hidden = study.graph().hidden_nodes().clone();
        let reduced = study.update_reduced_graph(options)?;
        debug!(nodes = reduced.node_count(), "reduced graph refreshed");
        Ok(reduced.to_node_link_with_hidden(&hidden))
    }

    pub async fn node_link(&self) -> NodeLinkGraph {
        self.study.read().await.graph().to_node_link()
    }

    pub async fn node_data(&self, node_id: NodeId) -> Result<NodeView> {
        self.study.read().await.graph().node_data(node_id)
    }

    /// A snapshot of the current graph.
    pub async fn graph(&self) -> ProvenanceGraph {
        self.study.read().await.graph().clone()
    }

    pub async fn events(&self) -> Vec<Value> {
        self.study.read().await.event_log().to_vec()
    }

    pub async fn errors(&self) -> Vec<String> {
        self.study.read().await.error_log().to_vec()
    }
}

impl Default for InMemoryProvenanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvenanceWriter for InMemoryProvenanceStore {
    async fn add_event(&self, event: Value) -> Result<Option<NodeId>> {
        self.study.write().await.process_event(event)
    }
}
