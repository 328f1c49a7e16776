use serde::{Deserialize, Serialize};
use serde_json::Value;
use simprov_id::{NodeId, ProvKind};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered attribute mapping shared by entities, agents and style metadata.
pub type Attributes = BTreeMap<String, Value>;

/// Ordered tuple of attribute values identifying successive versions of
/// the same logical artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKey(Vec<String>);

impl PrimaryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Build a key from attribute values. Strings are taken verbatim, every
    /// other value by its compact JSON text.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        Self(
            values
                .into_iter()
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// A versioned artifact snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    /// Presentation hints such as `background-color` or `border-width`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: Attributes,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            attributes: Attributes::new(),
            primary_key: None,
            meta: Attributes::new(),
        }
    }
}

/// A responsible party. Agents are not versioned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: NodeId::new(), name: name.into(), attributes: Attributes::new() }
    }
}

/// A unit of work together with the nodes it touched.
///
/// This is the value handed to [`crate::ProvenanceGraph::chain`]; once
/// chained, the graph keeps an [`ActivityNode`] that refers to its
/// entities and agents by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub used_entities: Vec<Entity>,
    #[serde(default)]
    pub generated_entities: Vec<Entity>,
    #[serde(default)]
    pub associated_agents: Vec<Agent>,
}

impl Activity {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(NodeId::new(), name)
    }

    pub fn with_id(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            used_entities: Vec::new(),
            generated_entities: Vec::new(),
            associated_agents: Vec::new(),
        }
    }

    /// Used entities followed by generated entities.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.used_entities.iter().chain(self.generated_entities.iter())
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.used_entities.iter_mut().chain(self.generated_entities.iter_mut())
    }
}

/// An activity as stored in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityNode {
    pub id: NodeId,
    pub name: String,
    pub used: Vec<NodeId>,
    pub generated: Vec<NodeId>,
    pub agents: Vec<NodeId>,
}

impl ActivityNode {
    pub(crate) fn new(id: NodeId, name: String) -> Self {
        Self { id, name, used: Vec::new(), generated: Vec::new(), agents: Vec::new() }
    }
}

/// A node of the provenance graph, tagged by kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ProvNode {
    Entity(Entity),
    Activity(ActivityNode),
    Agent(Agent),
}

impl ProvNode {
    pub fn kind(&self) -> ProvKind {
        match self {
            ProvNode::Entity(_) => ProvKind::Entity,
            ProvNode::Activity(_) => ProvKind::Activity,
            ProvNode::Agent(_) => ProvKind::Agent,
        }
    }

    pub fn id(&self) -> NodeId {
        match self {
            ProvNode::Entity(entity) => entity.id,
            ProvNode::Activity(activity) => activity.id,
            ProvNode::Agent(agent) => agent.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ProvNode::Entity(entity) => &entity.name,
            ProvNode::Activity(activity) => &activity.name,
            ProvNode::Agent(agent) => &agent.name,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            ProvNode::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_activity(&self) -> Option<&ActivityNode> {
        match self {
            ProvNode::Activity(activity) => Some(activity),
            _ => None,
        }
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            ProvNode::Agent(agent) => Some(agent),
            _ => None,
        }
    }
}

/// Read view of a single node for presentation collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeView {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: ProvKind,
    pub name: String,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    pub hidden: bool,
    /// Nodes joined to this activity by hand-made dependencies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_generated_edges: Vec<NodeId>,
}
