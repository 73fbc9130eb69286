use std::sync::Arc;

use serde_json::json;

use crate::graph::{GraphDescriptor, NodeId};
use crate::options::{ExecutorOptions, StageDispatch};
use crate::plan::{ExecutionPlan, PlanNodeInfo, Stage};
use crate::tests::{new_executor, values, MockNodeLogic};

fn ids(ids: Vec<NodeId>) -> Vec<String> {
    ids.into_iter().map(String::from).collect()
}

#[test]
fn yaml_plan_fixture_loads() -> anyhow::Result<()> {
    let plan = ExecutionPlan::from_file("../test_resources/test_plan.yaml")?;

    assert_eq!(plan.stages.len(), 4);
    assert!(!plan.stages[0].is_vm());
    assert!(plan.stages[3].is_vm());
    assert_eq!(ids(plan.stage_node_ids(1)), vec!["b", "c"]);
    assert_eq!(ids(plan.stage_node_ids(3)), vec!["sub"]);
    assert!(plan.stage_node_ids(10).is_empty());

    assert_eq!(ids(plan.node_ids()), vec!["a", "b", "c", "d", "sub"]);

    let Stage::Static { nodes } = &plan.stages[2] else {
        panic!("expected a static stage");
    };
    assert_eq!(nodes[0].upstream.len(), 2);
    assert_eq!(nodes[0].upstream[1].from.id, "c");
    assert_eq!(nodes[0].upstream[1].out, "result");
    assert_eq!(nodes[0].upstream[1].input, "right");

    Ok(())
}

#[test]
fn json_plan_fixture_loads() -> anyhow::Result<()> {
    let plan = ExecutionPlan::from_file("../test_resources/test_plan.json")?;

    let expected = ExecutionPlan::new(vec![
        Stage::Static {
            nodes: vec![PlanNodeInfo::new("a").with_downstream("b", "data", "data")],
        },
        Stage::Static {
            nodes: vec![PlanNodeInfo::new("b").with_upstream("a", "data", "data")],
        },
    ]);
    assert_eq!(plan, expected);

    Ok(())
}

#[test]
fn node_infos_visit_stubs_in_edge_order() {
    let plan = ExecutionPlan::new(vec![Stage::Static {
        nodes: vec![PlanNodeInfo::new("m")
            .with_upstream("u1", "o", "i")
            .with_upstream("u2", "o", "j")
            .with_downstream("d1", "o", "i")],
    }]);

    let visited: Vec<&str> = plan
        .node_infos()
        .into_iter()
        .map(|info| info.id.as_str())
        .collect();

    assert_eq!(visited, vec!["m", "u1", "u2", "d1"]);
}

#[test]
fn unknown_stage_type_is_rejected() {
    let yaml = "stages:\n  - type: dynamic\n    nodes: []\n";

    assert!(ExecutionPlan::from_yaml(yaml).is_err());
}

#[test]
fn vm_stage_without_node_is_rejected() {
    assert!(ExecutionPlan::from_json(r#"{"stages": [{"type": "vm"}]}"#).is_err());
}

#[test]
fn graph_fixture_loads() -> anyhow::Result<()> {
    let graph = GraphDescriptor::from_file("../test_resources/test_graph.yaml")?;

    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.edges.len(), 5);

    let a = graph.node_by_id("a").unwrap();
    assert_eq!(a.node_type, "input");
    assert_eq!(
        a.configuration.clone().unwrap(),
        values(json!({ "data": 42 }))
    );
    assert!(graph.node_by_id("sub").unwrap().metadata.is_some());
    assert!(graph.node_by_id("ghost").is_none());

    Ok(())
}

#[test]
fn graph_with_empty_id_is_rejected() {
    let json = r#"{"nodes": [{"id": "", "type": "input"}]}"#;

    assert!(GraphDescriptor::from_json(json).is_err());
}

#[test]
fn options_fixture_loads() -> anyhow::Result<()> {
    let options = ExecutorOptions::from_file("../test_resources/test_options.yaml")?;

    assert_eq!(options.stage_dispatch, StageDispatch::Sequential);

    Ok(())
}

#[tokio::test]
async fn fixtures_run_end_to_end() -> anyhow::Result<()> {
    let plan = ExecutionPlan::from_file("../test_resources/test_plan.yaml")?;
    let graph = GraphDescriptor::from_file("../test_resources/test_graph.yaml")?;
    let logic = Arc::new(MockNodeLogic::default());

    let mut executor = new_executor(plan, graph, &logic);
    let stats = executor.run().await?;

    let processed = "processed-{\"input\":\"input-a\"}";
    assert_eq!(stats.invoked_nodes, 5);
    assert_eq!(
        executor.outputs("d"),
        Some(values(json!({ "left": processed, "right": processed })))
    );
    assert_eq!(
        executor.outputs("sub"),
        Some(values(json!({ "source": processed })))
    );
    assert!(!executor.failed());
    assert_eq!(executor.progress(), 1.0);

    Ok(())
}
