//! Node identity for the provenance graph.
//!
//! Every node (entity, activity, agent) receives a random 128-bit identifier
//! when it is created. Identifiers are never reused; the node kind travels
//! separately as a [`ProvKind`] tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three node kinds of a provenance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProvKind {
    Entity,
    Activity,
    Agent,
}

impl ProvKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvKind::Entity => "Entity",
            ProvKind::Activity => "Activity",
            ProvKind::Agent => "Agent",
        }
    }
}

impl fmt::Display for ProvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a node in a provenance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(uuid::Uuid);

impl NodeId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Build an identifier from a fixed integer. Useful for fixtures that
    /// need stable ids.
    pub const fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    pub fn parse_str(raw: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(raw).map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn parses_its_own_display() {
        let id = NodeId::from_u128(42);
        let parsed: NodeId = id.to_string().parse().expect("parse node id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = NodeId::from_u128(1);
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000001\"");
    }

    #[test]
    fn rejects_garbage() {
        assert!(NodeId::parse_str("not-a-uuid").is_err());
    }
}
