//! Provenance capture, storage and reduction for simulation studies.
//!
//! Raw study events are turned into activities by a [`RuleRegistry`],
//! normalized against a [`StudySchema`] and chained into a
//! [`ProvenanceGraph`]. A [`GraphReducer`] produces a coarser copy of the
//! graph for display.

pub mod builders;
pub mod changes;
pub mod error;
pub mod events;
pub mod export;
pub mod graph;
pub mod normalizer;
pub mod reducer;
pub mod rules;
pub mod store;
pub mod study;
pub mod types;
pub mod vocabulary;

pub use builders::{ActivityBuilder, AgentBuilder, EntityBuilder};
pub use changes::{DependencyChanges, DependencyEdge};
pub use error::{ProvenanceError, Result};
pub use events::StudyEvent;
pub use export::{NodeLinkEdge, NodeLinkGraph, NodeLinkNode};
pub use graph::ProvenanceGraph;
pub use normalizer::{ActivityNormalizer, EntitySchema, SchemaNormalizer, StudySchema};
pub use reducer::{GraphReducer, ReduceOptions, Reduction, reduce};
pub use rules::{ActivityRule, RecordedActivityRule, RuleRegistry};
pub use store::{InMemoryProvenanceStore, ProvenanceWriter};
pub use study::{Study, StudyConfig};
pub use types::{
    Activity, ActivityNode, Agent, Attributes, Entity, NodeView, PrimaryKey, ProvNode,
};

pub use simprov_id::{NodeId, ProvKind};
