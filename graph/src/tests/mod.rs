mod plan_tests;

use std::sync::Arc;

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde_json::json;

use crate::data::{error_values, InputValues, OutputValues, Value};
use crate::executor::Executor;
use crate::graph::{GraphDescriptor, NodeDescriptor, NodeId};
use crate::node_logic::NodeLogic;
use crate::plan::{ExecutionPlan, PlanNodeInfo, Stage};

type Behavior = Arc<dyn Fn(&InputValues) -> anyhow::Result<OutputValues> + Send + Sync>;

/// Node logic with per-node overrides and typed defaults:
/// `input` yields `{data: "input-<id>"}`, `process` yields
/// `{result: "processed-<inputs as json>"}`, `output` echoes its inputs.
#[derive(Default)]
pub(crate) struct MockNodeLogic {
    behaviors: Mutex<HashMap<NodeId, Behavior>>,
    invocations: Mutex<Vec<(NodeId, InputValues)>>,
}

impl MockNodeLogic {
    pub(crate) fn set_behavior<F>(&self, id: &str, behavior: F)
    where
        F: Fn(&InputValues) -> anyhow::Result<OutputValues> + Send + Sync + 'static,
    {
        self.behaviors.lock().insert(id.into(), Arc::new(behavior));
    }

    pub(crate) fn invoked_ids(&self) -> Vec<NodeId> {
        self.invocations
            .lock()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub(crate) fn invocation_count(&self, id: &str) -> usize {
        self.invocations
            .lock()
            .iter()
            .filter(|(node_id, _)| node_id == id)
            .count()
    }

    pub(crate) fn last_inputs(&self, id: &str) -> Option<InputValues> {
        self.invocations
            .lock()
            .iter()
            .rev()
            .find(|(node_id, _)| node_id == id)
            .map(|(_, inputs)| inputs.clone())
    }
}

#[async_trait]
impl NodeLogic for MockNodeLogic {
    async fn invoke(
        &self,
        node: &NodeDescriptor,
        inputs: &InputValues,
    ) -> anyhow::Result<OutputValues> {
        self.invocations
            .lock()
            .push((node.id.clone(), inputs.clone()));

        let behavior = self.behaviors.lock().get(node.id.as_str()).cloned();
        if let Some(behavior) = behavior {
            return behavior(inputs);
        }

        let outputs = match node.node_type.as_str() {
            "input" => values(json!({ "data": format!("input-{}", node.id) })),
            "process" => values(json!({
                "result": format!("processed-{}", serde_json::to_string(inputs)?)
            })),
            "output" => inputs.clone(),
            other => error_values(format!("Unknown node type: {}", other)),
        };

        Ok(outputs)
    }
}

pub(crate) fn values(value: Value) -> OutputValues {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub(crate) fn graph(nodes: &[(&str, &str)]) -> GraphDescriptor {
    GraphDescriptor::new(
        nodes
            .iter()
            .map(|(id, node_type)| NodeDescriptor::new(*id, *node_type))
            .collect(),
        vec![],
    )
}

pub(crate) fn single_stage(ids: &[&str]) -> ExecutionPlan {
    ExecutionPlan::new(vec![Stage::Static {
        nodes: ids.iter().map(|id| PlanNodeInfo::new(*id)).collect(),
    }])
}

/// One stage per node, each wired to the next through `data` -> `data`.
pub(crate) fn linear_plan(ids: &[&str]) -> ExecutionPlan {
    let stages = ids
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let mut info = PlanNodeInfo::new(*id);
            if idx > 0 {
                info = info.with_upstream(ids[idx - 1], "data", "data");
            }
            if let Some(next) = ids.get(idx + 1) {
                info = info.with_downstream(*next, "data", "data");
            }

            Stage::Static { nodes: vec![info] }
        })
        .collect();

    ExecutionPlan::new(stages)
}

pub(crate) fn new_executor(
    plan: ExecutionPlan,
    graph: GraphDescriptor,
    logic: &Arc<MockNodeLogic>,
) -> Executor {
    let logic: Arc<dyn NodeLogic> = logic.clone();
    Executor::new(plan, graph, Some(logic))
}
