//! Extraction of activities from captured events.
//!
//! Rules are registered on an explicit [`RuleRegistry`] owned by the study;
//! there is no process-wide rule table.

use crate::error::{ProvenanceError, Result};
use crate::types::{Activity, Agent, Attributes, Entity};
use crate::vocabulary::{ACTIVITY_RECORDED, event_fields};
use serde::Deserialize;
use serde_json::Value;
use simprov_id::NodeId;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Turns one raw event into the activity it describes.
pub trait ActivityRule: Send + Sync {
    fn extract(&self, event: &Value) -> Result<Activity>;
}

impl<F> ActivityRule for F
where
    F: Fn(&Value) -> Result<Activity> + Send + Sync,
{
    fn extract(&self, event: &Value) -> Result<Activity> {
        self(event)
    }
}

#[derive(Default, Clone)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn ActivityRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry serving `"Activity Recorded"` events with
    /// [`RecordedActivityRule`].
    pub fn with_recorded_activities() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            ACTIVITY_RECORDED.to_string(),
            Arc::new(RecordedActivityRule) as Arc<dyn ActivityRule>,
        );
        Self { rules }
    }

    pub fn register<R>(&mut self, event_type: impl Into<String>, rule: R) -> Result<()>
    where
        R: ActivityRule + 'static,
    {
        let event_type = event_type.into();
        if self.rules.contains_key(&event_type) {
            return Err(ProvenanceError::DuplicateRule { event_type });
        }
        self.rules.insert(event_type, Arc::new(rule));
        Ok(())
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.rules.contains_key(event_type)
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run the rule registered for the event's `type`.
    pub fn execute(&self, event: &Value) -> Result<Activity> {
        let event_type = event_type(event)?;
        let rule = self
            .rules
            .get(event_type)
            .ok_or_else(|| ProvenanceError::NoRuleFound { event_type: event_type.to_string() })?;
        rule.extract(event)
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("event_types", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) fn event_type(event: &Value) -> Result<&str> {
    event
        .get(event_fields::TYPE)
        .and_then(Value::as_str)
        .ok_or_else(|| ProvenanceError::InvalidEvent {
            reason: format!("event has no string '{}' field", event_fields::TYPE),
        })
}

#[derive(Debug, Deserialize)]
struct ActivityRecord {
    #[serde(default)]
    id: Option<NodeId>,
    name: String,
    #[serde(default)]
    used: Vec<NodeRecord>,
    #[serde(default)]
    generated: Vec<NodeRecord>,
    #[serde(default)]
    agents: Vec<NodeRecord>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    #[serde(default)]
    id: Option<NodeId>,
    name: String,
    #[serde(default)]
    attributes: Attributes,
}

impl NodeRecord {
    fn into_entity(self) -> Entity {
        let mut entity = Entity::new(self.name);
        if let Some(id) = self.id {
            entity.id = id;
        }
        entity.attributes = self.attributes;
        entity
    }

    fn into_agent(self) -> Agent {
        let mut agent = Agent::new(self.name);
        if let Some(id) = self.id {
            agent.id = id;
        }
        agent.attributes = self.attributes;
        agent
    }
}

/// Reads a declarative activity from the event's `activity` field:
///
/// ```json
/// {"type": "Activity Recorded",
///  "activity": {"name": "Update",
///               "used": [{"name": "File", "attributes": {"path": "a.txt"}}],
///               "generated": [{"name": "File", "attributes": {"path": "a.txt"}}],
///               "agents": [{"name": "Modeller"}]}}
/// ```
///
/// Omitted ids are freshly generated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedActivityRule;

impl ActivityRule for RecordedActivityRule {
    fn extract(&self, event: &Value) -> Result<Activity> {
        let payload = event.get(event_fields::ACTIVITY).ok_or_else(|| {
            ProvenanceError::InvalidEvent {
                reason: format!("missing '{}' payload", event_fields::ACTIVITY),
            }
        })?;
        let record = ActivityRecord::deserialize(payload)?;

        let mut activity = match record.id {
            Some(id) => Activity::with_id(id, record.name),
            None => Activity::new(record.name),
        };
        activity.used_entities = record.used.into_iter().map(NodeRecord::into_entity).collect();
        activity.generated_entities =
            record.generated.into_iter().map(NodeRecord::into_entity).collect();
        activity.associated_agents = record.agents.into_iter().map(NodeRecord::into_agent).collect();
        Ok(activity)
    }
}
