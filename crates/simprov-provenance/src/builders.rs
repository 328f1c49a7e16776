use crate::types::{Activity, Agent, Attributes, Entity, PrimaryKey};
use simprov_id::NodeId;

pub struct EntityBuilder {
    id: NodeId,
    name: String,
    attributes: Attributes,
    primary_key: Option<PrimaryKey>,
    meta: Attributes,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            attributes: Attributes::new(),
            primary_key: None,
            meta: Attributes::new(),
        }
    }

    pub fn id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Set the primary key directly, bypassing schema normalization.
    pub fn primary_key<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(PrimaryKey::new(parts));
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> Entity {
        Entity {
            id: self.id,
            name: self.name,
            attributes: self.attributes,
            primary_key: self.primary_key,
            meta: self.meta,
        }
    }
}

pub struct AgentBuilder {
    id: NodeId,
    name: String,
    attributes: Attributes,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: NodeId::new(), name: name.into(), attributes: Attributes::new() }
    }

    pub fn id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    pub fn attr(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> Agent {
        Agent { id: self.id, name: self.name, attributes: self.attributes }
    }
}

pub struct ActivityBuilder {
    activity: Activity,
}

impl ActivityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { activity: Activity::new(name) }
    }

    pub fn id(mut self, id: NodeId) -> Self {
        self.activity.id = id;
        self
    }

    pub fn uses(mut self, entity: Entity) -> Self {
        self.activity.used_entities.push(entity);
        self
    }

    pub fn generates(mut self, entity: Entity) -> Self {
        self.activity.generated_entities.push(entity);
        self
    }

    pub fn associated_with(mut self, agent: Agent) -> Self {
        self.activity.associated_agents.push(agent);
        self
    }

    /// Add a used entity built in place.
    pub fn uses_with<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(EntityBuilder) -> EntityBuilder,
    {
        let entity = f(EntityBuilder::new(name)).build();
        self.uses(entity)
    }

    /// Add a generated entity built in place.
    pub fn generates_with<F>(self, name: &str, f: F) -> Self
    where
        F: FnOnce(EntityBuilder) -> EntityBuilder,
    {
        let entity = f(EntityBuilder::new(name)).build();
        self.generates(entity)
    }

    pub fn build(self) -> Activity {
        self.activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_activity_with_inline_entities() {
        let activity = ActivityBuilder::new("Update")
            .uses_with("File", |e| e.attr("path", "a.txt").primary_key(["a.txt"]))
            .generates_with("File", |e| e.attr("path", "a.txt").primary_key(["a.txt"]))
            .associated_with(AgentBuilder::new("Modeller").attr("email", "m@example.org").build())
            .build();

        assert_eq!(activity.name, "Update");
        assert_eq!(activity.used_entities.len(), 1);
        assert_eq!(activity.generated_entities.len(), 1);
        assert_eq!(activity.used_entities[0].attributes["path"], json!("a.txt"));
        assert_eq!(
            activity.used_entities[0].primary_key,
            activity.generated_entities[0].primary_key
        );
        assert_ne!(activity.used_entities[0].id, activity.generated_entities[0].id);
        assert_eq!(activity.associated_agents[0].name, "Modeller");
    }
}
