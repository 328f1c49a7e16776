use serde_json::{Value, json};
use simprov_provenance::{
    Activity, ActivityBuilder, ActivityNormalizer, EntityBuilder, EntitySchema,
    InMemoryProvenanceStore, NodeId, PrimaryKey, ProvKind, ProvenanceError, ProvenanceWriter,
    ReduceOptions, RuleRegistry, Study, StudyConfig, StudySchema,
};
use tracing_test::traced_test;

fn store() -> InMemoryProvenanceStore {
    let schema = StudySchema::new().with_entity("File", EntitySchema::new(["path"]));
    InMemoryProvenanceStore::with_config(StudyConfig::new().with_schema(schema))
}

fn recorded(name: &str, used: &[&str], generated: &[&str]) -> Value {
    let files = |paths: &[&str]| -> Vec<Value> {
        paths
            .iter()
            .map(|path| json!({"name": "File", "attributes": {"path": path}}))
            .collect()
    };
    json!({
        "type": "Activity Recorded",
        "activity": {
            "name": name,
            "used": files(used),
            "generated": files(generated),
            "agents": [{"id": NodeId::from_u128(99).to_string(), "name": "Modeller"}]
        }
    })
}

#[tokio::test]
async fn in_memory_store_chains_recorded_activities() {
    let store = store();
    let create = store
        .add_event(recorded("Create", &[], &["a.txt"]))
        .await
        .expect("create")
        .expect("activity id");
    let update = store
        .add_event(recorded("Update", &["a.txt"], &["a.txt"]))
        .await
        .expect("update")
        .expect("activity id");

    assert_eq!(store.events().await.len(), 2);
    let export = store.node_link().await;
    let count = |kind: ProvKind| export.nodes.iter().filter(|node| node.kind == kind).count();
    assert_eq!(count(ProvKind::Activity), 2);
    assert_eq!(count(ProvKind::Entity), 2);
    assert_eq!(count(ProvKind::Agent), 1);

    let graph = store.graph().await;
    let used = graph.activity(update).expect("update").used.clone();
    assert_eq!(graph.activity(create).expect("create").generated, used);
    let view = store.node_data(used[0]).await.expect("view");
    assert_eq!(view.attributes["path"], json!("a.txt"));
}

#[tokio::test]
#[traced_test]
async fn rejected_edit_is_logged_and_leaves_graph_untouched() {
    let store = store();
    let create = store
        .add_event(recorded("Create", &[], &["a.txt"]))
        .await
        .expect("create")
        .expect("activity id");
    store.add_event(recorded("Update", &["a.txt"], &["a.txt"])).await.expect("update");
    let graph = store.graph().await;
    let latest = graph
        .entities()
        .map(|entity| entity.id)
        .find(|id| graph.predecessors(*id).count() == 0)
        .expect("latest version");
    let edges_before: Vec<_> = graph.edges().collect();

    let err = store
        .add_event(json!({
            "type": "Update Dependencies",
            "node_id": create.to_string(),
            "changes": {"added": [{"source": create.to_string(), "target": latest.to_string()}]}
        }))
        .await
        .expect_err("cycle");

    assert!(matches!(err, ProvenanceError::CycleDetected { .. }));
    assert_eq!(store.graph().await.edges().collect::<Vec<_>>(), edges_before);
    assert_eq!(store.events().await.len(), 2);
    assert_eq!(store.errors().await.len(), 1);
    assert!(logs_contain("rejected dependency change"));
    assert!(logs_contain("event rejected"));
}

#[tokio::test]
#[traced_test]
async fn add_event_with_logging_swallows_failures() {
    let store = store();
    store
        .add_event_with_logging(json!({"type": "Unknown Event"}), "capturer")
        .await;

    assert!(store.events().await.is_empty());
    assert_eq!(store.errors().await.len(), 1);
    assert!(logs_contain("failed to record provenance event"));
}

#[tokio::test]
async fn control_events_edit_the_graph() {
    let store = store();
    let create = store
        .add_event(recorded("Create", &[], &["a.txt"]))
        .await
        .expect("create")
        .expect("activity id");
    let entity = store.graph().await.activity(create).expect("create").generated[0];

    store
        .add_event(json!({
            "type": "Update Entity",
            "node_id": entity.to_string(),
            "changes": {"checked": true}
        }))
        .await
        .expect("update entity");
    store
        .add_event(json!({"type": "Hide Node", "node_id": create.to_string(), "change": true}))
        .await
        .expect("hide");

    let view = store.node_data(entity).await.expect("entity view");
    assert_eq!(view.attributes["checked"], json!(true));
    assert!(store.node_data(create).await.expect("activity view").hidden);
    assert_eq!(store.events().await.len(), 3);
}

#[tokio::test]
async fn concurrent_writers_and_reducers() {
    let store = store();
    let mut handles = Vec::new();
    for n in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let path = format!("model-{n}.ml3");
            store.add_event(recorded("Create Model", &[], &[path.as_str()])).await
        }));
    }
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.reduce(ReduceOptions::default()).await.map(|_| None)
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("task");
    }

    let reduced = store.reduce(ReduceOptions::default()).await.expect("reduce");
    assert_eq!(reduced.activities().count(), 8);
    assert_eq!(store.events().await.len(), 8);
}

#[tokio::test]
async fn refresh_reduced_exports_source_hidden_flags() {
    let store = store();
    let create = store
        .add_event(recorded("Create", &[], &["a.txt"]))
        .await
        .expect("create")
        .expect("activity id");
    store.add_event(recorded("Update", &["a.txt"], &["a.txt"])).await.expect("update");
    store
        .add_event(json!({"type": "Hide Node", "node_id": create.to_string(), "change": true}))
        .await
        .expect("hide");

    let export = store
        .refresh_reduced(Some(ReduceOptions::new().with_split_agents(true)))
        .await
        .expect("refresh");
    let activities: Vec<_> = export.nodes.iter().filter(|node| node.kind == ProvKind::Activity).collect();
    assert_eq!(activities.len(), 2);
    assert_eq!(export.node(create).map(|node| node.hidden), Some(true));
    assert_eq!(export.nodes.iter().filter(|node| node.kind == ProvKind::Agent).count(), 2);
}

#[tokio::test]
async fn recorded_activity_with_colliding_ids_is_rejected() {
    let store = store();
    let shared = NodeId::from_u128(5).to_string();
    let err = store
        .add_event(json!({
            "type": "Activity Recorded",
            "activity": {
                "name": "Create",
                "generated": [{"id": shared, "name": "File", "attributes": {"path": "a.txt"}}],
                "agents": [{"id": shared, "name": "Modeller"}]
            }
        }))
        .await
        .expect_err("colliding ids");

    assert!(matches!(err, ProvenanceError::AlreadyChained { .. }));
    assert!(store.graph().await.is_empty());
    assert!(store.events().await.is_empty());
    assert_eq!(store.errors().await.len(), 1);
    store.reduce(ReduceOptions::default()).await.expect("graph stays reducible");
}

/// Keys every entity by its `path` attribute.
struct PathKeys;

impl ActivityNormalizer for PathKeys {
    fn normalize(&self, mut activity: Activity) -> simprov_provenance::Result<Activity> {
        for entity in activity.used_entities.iter_mut().chain(activity.generated_entities.iter_mut()) {
            let path = entity.attributes.get("path").and_then(Value::as_str).unwrap_or_default();
            entity.primary_key = Some(PrimaryKey::new([path]));
        }
        Ok(activity)
    }
}

fn model_saved(event: &Value) -> simprov_provenance::Result<Activity> {
    let path = event["path"].as_str().unwrap_or_default();
    Ok(ActivityBuilder::new("Save Model")
        .generates(EntityBuilder::new("Model").attr("path", path).build())
        .build())
}

#[tokio::test]
async fn study_runs_custom_rules_and_normalizer() {
    let mut rules = RuleRegistry::new();
    rules.register("Model Saved", model_saved).expect("register");
    let mut study = Study::default().with_rules(rules).with_normalizer(PathKeys);
    study
        .register_rule("Model Loaded", |event: &Value| -> simprov_provenance::Result<Activity> {
            let path = event["path"].as_str().unwrap_or_default();
            Ok(ActivityBuilder::new("Load Model")
                .uses(EntityBuilder::new("Model").attr("path", path).build())
                .build())
        })
        .expect("register through study");
    let err = study
        .register_rule("Model Saved", model_saved)
        .expect_err("duplicate rule");
    assert!(matches!(err, ProvenanceError::DuplicateRule { .. }));

    let store = InMemoryProvenanceStore::from_study(study);
    let saved = store
        .add_event(json!({"type": "Model Saved", "path": "m.ml3"}))
        .await
        .expect("save")
        .expect("activity id");
    let loaded = store
        .add_event(json!({"type": "Model Loaded", "path": "m.ml3"}))
        .await
        .expect("load")
        .expect("activity id");
    let err = store
        .add_event(recorded("Create", &[], &["a.txt"]))
        .await
        .expect_err("built-in rule replaced");
    assert!(matches!(err, ProvenanceError::NoRuleFound { .. }));

    let graph = store.graph().await;
    let model = graph.activity(saved).expect("save").generated[0];
    assert_eq!(graph.activity(loaded).expect("load").used, vec![model]);
    assert_eq!(
        graph.current_version(&PrimaryKey::new(["m.ml3"])).map(|entity| entity.id),
        Some(model)
    );
}
