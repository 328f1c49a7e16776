use simprov_id::{NodeId, ProvKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("no {kind} with id {node_id}")]
    NotFound { node_id: NodeId, kind: ProvKind },
    #[error("no node with id {node_id}")]
    UnknownNode { node_id: NodeId },
    #[error("dependency change on activity {activity_id} would create a cycle")]
    CycleDetected { activity_id: NodeId },
    #[error("invalid reduction context: {reason}")]
    InvalidContext { reason: String },
    #[error("node {node_id} is already part of the graph")]
    AlreadyChained { node_id: NodeId },
    #[error("invalid dependency {from} -> {to} for activity {activity_id}")]
    InvalidDependency { activity_id: NodeId, from: NodeId, to: NodeId },
    #[error("no rule registered for event type '{event_type}'")]
    NoRuleFound { event_type: String },
    #[error("a rule for event type '{event_type}' is already registered")]
    DuplicateRule { event_type: String },
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },
    #[error("no schema for entity type '{name}'")]
    UnknownEntityType { name: String },
    #[error("entity '{entity}' is missing primary key attribute '{attribute}'")]
    MissingPrimaryKeyAttribute { entity: String, attribute: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvenanceError {
    /// Whether this error reports a missing node, typed or not.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProvenanceError::NotFound { .. } | ProvenanceError::UnknownNode { .. })
    }

    pub(crate) fn not_found(node_id: NodeId, kind: ProvKind) -> Self {
        ProvenanceError::NotFound { node_id, kind }
    }

    pub(crate) fn invalid_context(reason: impl Into<String>) -> Self {
        ProvenanceError::InvalidContext { reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;
