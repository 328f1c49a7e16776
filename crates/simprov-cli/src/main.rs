//! SimProv command line
//!
//! Replays a recorded study event log into a provenance graph and prints
//! either the full or the reduced graph.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use simprov_observability::{spans, tracing_setup};
use simprov_provenance::{
    InMemoryProvenanceStore, NodeLinkGraph, ProvKind, ProvenanceWriter, ReduceOptions,
    StudyConfig, StudySchema,
};
use std::path::{Path, PathBuf};
use tracing::{Instrument, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Nodes and edges as JSON.
    NodeLink,
    /// Node and edge counts.
    Summary,
}

#[derive(Parser, Debug)]
#[command(name = "simprov")]
#[command(about = "Replay a study event log and print its provenance graph", long_about = None)]
struct Cli {
    /// JSON file holding an array of study events.
    #[arg(value_name = "EVENT_LOG")]
    event_log: PathBuf,

    /// JSON file declaring entity types and their primary keys.
    #[arg(long, value_name = "FILE")]
    schema: PathBuf,

    /// Print the reduced graph instead of the full one.
    #[arg(long)]
    reduced: bool,

    /// Drop dependencies implied by longer paths.
    #[arg(long, requires = "reduced")]
    reduce_transitives: bool,

    /// Leave hidden activities out of the reduced graph.
    #[arg(long, requires = "reduced")]
    hide_nodes: bool,

    /// Give every reduced activity its own copy of each agent.
    #[arg(long, requires = "reduced")]
    split_agents: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::NodeLink)]
    format: OutputFormat,
}

impl Cli {
    fn reduce_options(&self) -> ReduceOptions {
        ReduceOptions::new()
            .with_reduce_transitives(self.reduce_transitives)
            .with_hide_nodes(self.hide_nodes)
            .with_split_agents(self.split_agents)
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    events: usize,
    activities: usize,
    entities: usize,
    agents: usize,
    edges: usize,
    hidden: usize,
    user_generated_edges: usize,
}

impl Summary {
    fn new(events: usize, graph: &NodeLinkGraph) -> Self {
        let count = |kind: ProvKind| graph.nodes.iter().filter(|node| node.kind == kind).count();
        Self {
            events,
            activities: count(ProvKind::Activity),
            entities: count(ProvKind::Entity),
            agents: count(ProvKind::Agent),
            edges: graph.edges.len(),
            hidden: graph.nodes.iter().filter(|node| node.hidden).count(),
            user_generated_edges: graph.edges.iter().filter(|edge| edge.user_generated).count(),
        }
    }
}

fn read_schema(path: &Path) -> anyhow::Result<StudySchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    StudySchema::from_json_str(&text)
        .with_context(|| format!("Invalid schema {}", path.display()))
}

fn read_event_log(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event log {}", path.display()))?;
    let log: Value = serde_json::from_str(&text)
        .with_context(|| format!("Event log {} is not JSON", path.display()))?;
    match log {
        Value::Array(events) => Ok(events),
        _ => anyhow::bail!("Event log {} must hold a JSON array", path.display()),
    }
}

async fn replay(store: &InMemoryProvenanceStore, events: Vec<Value>) -> anyhow::Result<usize> {
    let span = spans::replay_event_log(events.len());
    async move {
        let mut applied = 0;
        for (index, event) in events.into_iter().enumerate() {
            if let Err(err) = store.add_event(event).await {
                warn!(index, error = %err, "stopping replay");
                return Err(err).with_context(|| format!("Event {index} was rejected"));
            }
            applied += 1;
        }
        Ok(applied)
    }
    .instrument(span)
    .await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_setup::init_tracing();

    let cli = Cli::parse();
    let schema = read_schema(&cli.schema)?;
    let events = read_event_log(&cli.event_log)?;

    let store = InMemoryProvenanceStore::with_config(
        StudyConfig::new()
            .with_schema(schema)
            .with_reduce_options(cli.reduce_options()),
    );
    let applied = replay(&store, events).await?;
    info!(applied, "event log loaded");

    let graph = if cli.reduced {
        store
            .refresh_reduced(None)
            .await
            .context("Failed to reduce provenance graph")?
    } else {
        store.node_link().await
    };

    let output = match cli.format {
        OutputFormat::NodeLink => serde_json::to_string_pretty(&graph)?,
        OutputFormat::Summary => serde_json::to_string_pretty(&Summary::new(applied, &graph))?,
    };
    println!("{output}");
    Ok(())
}
