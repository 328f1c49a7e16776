//! Raw study events and their typed interpretation.
//!
//! Events arrive as JSON objects tagged by a `type` field. Three types are
//! edits of the graph itself; every other type is a capture event that a
//! rule turns into an activity.

use crate::changes::DependencyChanges;
use crate::error::{ProvenanceError, Result};
use crate::rules::event_type;
use crate::types::Attributes;
use crate::vocabulary::{control_events, event_fields};
use serde::de::DeserializeOwned;
use serde_json::Value;
use simprov_id::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum StudyEvent {
    UpdateDependencies { node_id: NodeId, changes: DependencyChanges },
    UpdateEntity { node_id: NodeId, changes: Attributes },
    HideNode { node_id: NodeId, hidden: bool },
    Capture { event_type: String, payload: Value },
}

impl StudyEvent {
    pub fn from_value(event: &Value) -> Result<Self> {
        let kind = event_type(event)?;
        let parsed = match kind {
            control_events::UPDATE_DEPENDENCIES => StudyEvent::UpdateDependencies {
                node_id: field(event, event_fields::NODE_ID)?,
                changes: field(event, event_fields::CHANGES)?,
            },
            control_events::UPDATE_ENTITY => StudyEvent::UpdateEntity {
                node_id: field(event, event_fields::NODE_ID)?,
                changes: field(event, event_fields::CHANGES)?,
            },
            control_events::HIDE_NODE => StudyEvent::HideNode {
                node_id: field(event, event_fields::NODE_ID)?,
                hidden: field(event, event_fields::CHANGE)?,
            },
            other => StudyEvent::Capture { event_type: other.to_string(), payload: event.clone() },
        };
        Ok(parsed)
    }

    pub fn event_type(&self) -> &str {
        match self {
            StudyEvent::UpdateDependencies { .. } => control_events::UPDATE_DEPENDENCIES,
            StudyEvent::UpdateEntity { .. } => control_events::UPDATE_ENTITY,
            StudyEvent::HideNode { .. } => control_events::HIDE_NODE,
            StudyEvent::Capture { event_type, .. } => event_type,
        }
    }

    pub fn is_control(&self) -> bool {
        !matches!(self, StudyEvent::Capture { .. })
    }
}

fn field<T: DeserializeOwned>(event: &Value, name: &str) -> Result<T> {
    let value = event.get(name).ok_or_else(|| ProvenanceError::InvalidEvent {
        reason: format!("missing '{name}' field"),
    })?;
    T::deserialize(value).map_err(|err| ProvenanceError::InvalidEvent {
        reason: format!("invalid '{name}' field: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hide_node() {
        let id = NodeId::from_u128(3);
        let event = json!({"type": "Hide Node", "node_id": id.to_string(), "change": true});
        assert_eq!(
            StudyEvent::from_value(&event).unwrap(),
            StudyEvent::HideNode { node_id: id, hidden: true }
        );
    }

    #[test]
    fn parses_dependency_changes() {
        let activity = NodeId::from_u128(1);
        let entity = NodeId::from_u128(2);
        let event = json!({
            "type": "Update Dependencies",
            "node_id": activity.to_string(),
            "changes": {"added": [{"source": activity.to_string(), "target": entity.to_string()}]}
        });

        let StudyEvent::UpdateDependencies { node_id, changes } = StudyEvent::from_value(&event).unwrap()
        else {
            panic!("expected a dependency update");
        };
        assert_eq!(node_id, activity);
        assert_eq!(changes, DependencyChanges::new().add(activity, entity));
    }

    #[test]
    fn other_types_are_captures() {
        let event = json!({"type": "Model Saved", "filePath": "m.ml3"});
        let parsed = StudyEvent::from_value(&event).unwrap();
        assert!(!parsed.is_control());
        assert_eq!(parsed.event_type(), "Model Saved");
    }

    #[test]
    fn malformed_node_id_is_invalid() {
        let event = json!({"type": "Update Entity", "node_id": "nope", "changes": {}});
        let err = StudyEvent::from_value(&event).unwrap_err();
        assert!(matches!(err, ProvenanceError::InvalidEvent { .. }));
    }
}
