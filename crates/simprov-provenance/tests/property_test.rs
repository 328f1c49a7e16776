use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use proptest::prelude::*;
use simprov_provenance::{
    ActivityBuilder, DependencyChanges, EntityBuilder, NodeId, ProvenanceError, ProvenanceGraph,
    reduce,
};

const NAMES: [&str; 3] = ["Specify", "Simulate", "Analyse"];

#[derive(Debug, Clone)]
enum Op {
    Chain { name: usize, used: Vec<u8>, generated: Vec<u8> },
    Edit { activity: usize, entity: usize, uses: bool, add: bool },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (
            0..NAMES.len(),
            proptest::collection::vec(0u8..5, 0..3),
            proptest::collection::vec(0u8..5, 1..3),
        )
            .prop_map(|(name, used, generated)| Op::Chain { name, used, generated }),
        2 => (any::<usize>(), any::<usize>(), any::<bool>(), any::<bool>())
            .prop_map(|(activity, entity, uses, add)| Op::Edit { activity, entity, uses, add }),
    ]
}

fn file(key: u8) -> EntityBuilder {
    let path = format!("file-{key}");
    EntityBuilder::new("File").attr("path", path.clone()).primary_key([path])
}

fn hypothetical_is_cyclic(graph: &ProvenanceGraph, changes: &DependencyChanges) -> bool {
    let mut topology: DiGraphMap<NodeId, ()> = DiGraphMap::new();
    for node in graph.nodes() {
        topology.add_node(node.id());
    }
    for (source, target) in graph.edges() {
        topology.add_edge(source, target, ());
    }
    for edge in &changes.removed {
        topology.remove_edge(edge.source, edge.target);
    }
    for edge in &changes.added {
        topology.add_edge(edge.source, edge.target, ());
    }
    is_cyclic_directed(&topology)
}

fn is_acyclic(graph: &ProvenanceGraph) -> bool {
    !hypothetical_is_cyclic(graph, &DependencyChanges::new())
}

fn apply(graph: &mut ProvenanceGraph, op: Op) -> Result<(), TestCaseError> {
    match op {
        Op::Chain { name, used, generated } => {
            let mut builder = ActivityBuilder::new(NAMES[name]);
            for key in used {
                builder = builder.uses(file(key).build());
            }
            for key in generated {
                builder = builder.generates(file(key).build());
            }
            graph.chain(builder.build()).map_err(|err| TestCaseError::fail(err.to_string()))?;
        }
        Op::Edit { activity, entity, uses, add } => {
            let activities: Vec<NodeId> = graph.activities().map(|node| node.id).collect();
            let entities: Vec<NodeId> = graph.entities().map(|node| node.id).collect();
            if activities.is_empty() || entities.is_empty() {
                return Ok(());
            }
            let activity = activities[activity % activities.len()];
            let entity = entities[entity % entities.len()];
            let (source, target) = if uses { (activity, entity) } else { (entity, activity) };
            let changes = if add {
                DependencyChanges::new().add(source, target)
            } else {
                DependencyChanges::new().remove(source, target)
            };

            let expected = hypothetical_is_cyclic(graph, &changes);
            prop_assert_eq!(graph.would_cycle(&changes), expected);

            let edges_before: Vec<(NodeId, NodeId)> = graph.edges().collect();
            match graph.update_activity_dependencies(activity, &changes) {
                Err(ProvenanceError::CycleDetected { .. }) => {
                    prop_assert!(expected);
                    prop_assert_eq!(graph.edges().collect::<Vec<_>>(), edges_before);
                }
                Err(other) => return Err(TestCaseError::fail(other.to_string())),
                Ok(()) => prop_assert!(!expected),
            }
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn graph_stays_acyclic(ops in proptest::collection::vec(arb_op(), 1..24)) {
        let mut graph = ProvenanceGraph::new();
        for op in ops {
            apply(&mut graph, op)?;
            prop_assert!(is_acyclic(&graph));
        }
    }

    #[test]
    fn reduction_keeps_every_activity_name(ops in proptest::collection::vec(arb_op(), 1..16)) {
        let mut graph = ProvenanceGraph::new();
        for op in ops {
            apply(&mut graph, op)?;
        }
        let reduced = reduce(&graph, true, false, true)
            .map_err(|err| TestCaseError::fail(err.to_string()))?;

        prop_assert!(is_acyclic(&reduced));
        prop_assert!(reduced.activities().count() <= graph.activities().count());
        for activity in reduced.activities() {
            prop_assert!(graph.is_activity(activity.id));
            prop_assert_eq!(
                graph.activity(activity.id).map(|original| original.name.as_str()),
                Some(activity.name.as_str())
            );
        }
    }
}
