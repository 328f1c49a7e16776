//! Named spans for the provenance pipeline.
//!
//! Keeping span names in one place lets log filters and subscribers target
//! them without string duplication across crates.

use tracing::Span;

pub fn process_event(event_type: &str) -> Span {
    tracing::info_span!("simprov.process_event", event_type = %event_type)
}

pub fn replay_event_log(event_count: usize) -> Span {
    tracing::info_span!("simprov.replay", event_count)
}

pub fn chain_activity(activity: &str) -> Span {
    tracing::debug_span!("simprov.chain", activity = %activity)
}

pub fn reduce_graph(reduce_transitives: bool, hide_nodes: bool, split_agents: bool) -> Span {
    tracing::info_span!(
        "simprov.reduce",
        reduce_transitives,
        hide_nodes,
        split_agents
    )
}

pub fn contraction_pass(pass: usize, frontier: usize) -> Span {
    tracing::debug_span!("simprov.reduce.contraction_pass", pass, frontier)
}
