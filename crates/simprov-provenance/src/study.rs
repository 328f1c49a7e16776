//! A study: one provenance graph plus the pipeline feeding it.

use crate::error::Result;
use crate::events::StudyEvent;
use crate::graph::ProvenanceGraph;
use crate::normalizer::{ActivityNormalizer, SchemaNormalizer, StudySchema};
use crate::reducer::{GraphReducer, ReduceOptions, Reduction};
use crate::rules::{ActivityRule, RuleRegistry};
use serde_json::Value;
use simprov_id::NodeId;
use simprov_observability::spans;
use std::fmt;
use tracing::{debug, info, warn};

/// Settings a study is created with.
#[derive(Debug, Clone, Default)]
pub struct StudyConfig {
    pub schema: StudySchema,
    /// Options used by [`Study::update_reduced_graph`] when none are given.
    pub reduce_options: ReduceOptions,
}

impl StudyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: StudySchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_reduce_options(mut self, options: ReduceOptions) -> Self {
        self.reduce_options = options;
        self
    }
}

pub struct Study {
    graph: ProvenanceGraph,
    rules: RuleRegistry,
    normalizer: Box<dyn ActivityNormalizer>,
    reduce_options: ReduceOptions,
    event_log: Vec<Value>,
    error_log: Vec<String>,
    reduced_graph: Option<ProvenanceGraph>,
}

impl Study {
    /// A study normalizing against the configured schema, with the
    /// built-in `"Activity Recorded"` rule registered.
    pub fn new(config: StudyConfig) -> Self {
        Self {
            graph: ProvenanceGraph::new(),
            rules: RuleRegistry::with_recorded_activities(),
            normalizer: Box::new(SchemaNormalizer::new(config.schema)),
            reduce_options: config.reduce_options,
            event_log: Vec::new(),
            error_log: Vec::new(),
            reduced_graph: None,
        }
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_normalizer<N>(mut self, normalizer: N) -> Self
    where
        N: ActivityNormalizer + 'static,
    {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn register_rule<R>(&mut self, event_type: impl Into<String>, rule: R) -> Result<()>
    where
        R: ActivityRule + 'static,
    {
        self.rules.register(event_type, rule)
    }

    /// Apply one raw event.
    ///
    /// Accepted events are appended to the event log. A rejected event
    /// leaves the graph untouched and its error message is appended to the
    /// error log. Capture events return the id of the chained activity.
    pub fn process_event(&mut self, event: Value) -> Result<Option<NodeId>> {
        match self.apply(&event) {
            Ok(chained) => {
                self.event_log.push(event);
                self.reduced_graph = None;
                Ok(chained)
            }
            Err(err) => {
                warn!(error = %err, "event rejected");
                self.error_log.push(err.to_string());
                Err(err)
            }
        }
    }

    /// Process `events` in order, stopping at the first rejected one.
    /// Returns how many were applied.
    pub fn replay<I>(&mut self, events: I) -> Result<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        let events: Vec<Value> = events.into_iter().collect();
        let span = spans::replay_event_log(events.len());
        let _guard = span.enter();

        let mut applied = 0;
        for event in events {
            self.process_event(event)?;
            applied += 1;
        }
        info!(applied, nodes = self.graph.node_count(), "event log replayed");
        Ok(applied)
    }

    fn apply(&mut self, raw: &Value) -> Result<Option<NodeId>> {
        let event = StudyEvent::from_value(raw)?;
        let span = spans::process_event(event.event_type());
        let _guard = span.enter();

        match event {
            StudyEvent::UpdateDependencies { node_id, changes } => {
                self.graph.update_activity_dependencies(node_id, &changes)?;
                Ok(None)
            }
            StudyEvent::UpdateEntity { node_id, changes } => {
                self.graph.update_entity_attributes(node_id, changes)?;
                Ok(None)
            }
            StudyEvent::HideNode { node_id, hidden } => {
                self.graph.propagate_visibility(node_id, hidden)?;
                Ok(None)
            }
            StudyEvent::Capture { event_type, payload } => {
                let extracted = self.rules.execute(&payload)?;
                let normalized = self.normalizer.normalize(extracted)?;
                let activity_id = self.graph.chain(normalized)?;
                debug!(event_type = %event_type, activity_id = %activity_id, "capture event chained");
                Ok(Some(activity_id))
            }
        }
    }

    pub fn reduce(&self, options: ReduceOptions) -> Result<Reduction> {
        GraphReducer::new(&self.graph).run(options)
    }

    /// Recompute and keep the reduced graph, using the configured options
    /// when `options` is `None`.
    pub fn update_reduced_graph(&mut self, options: Option<ReduceOptions>) -> Result<&ProvenanceGraph> {
        let options = options.unwrap_or(self.reduce_options);
        let reduction = self.reduce(options)?;
        Ok(self.reduced_graph.insert(reduction.graph))
    }

    /// The last reduced graph, cleared whenever an event is applied.
    pub fn reduced_graph(&self) -> Option<&ProvenanceGraph> {
        self.reduced_graph.as_ref()
    }

    pub fn graph(&self) -> &ProvenanceGraph {
        &self.graph
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn reduce_options(&self) -> ReduceOptions {
        self.reduce_options
    }

    pub fn event_log(&self) -> &[Value] {
        &self.event_log
    }

    pub fn error_log(&self) -> &[String] {
        &self.error_log
    }
}

impl Default for Study {
    fn default() -> Self {
        Self::new(StudyConfig::default())
    }
}

impl fmt::Debug for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Study")
            .field("nodes", &self.graph.node_count())
            .field("rules", &self.rules)
            .field("events", &self.event_log.len())
            .field("errors", &self.error_log.len())
            .finish()
    }
}
