use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::cache::Cache;
use crate::data::{
    error_message, error_values, to_output_values, to_port_values, InputValues, OutputValues,
};
use crate::graph::{GraphDescriptor, NodeDescriptor, NodeId};
use crate::node_logic::NodeLogic;
use crate::node_state::{NodeState, NodeStateController};
use crate::options::{ExecutorOptions, StageDispatch};
use crate::plan::{ExecutionPlan, PlanNodeInfo, Stage};
use common::key_index_vec::KeyIndexVec;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutorError {
    #[error("No NodeLogic provided to executor")]
    MissingNodeLogic,
    #[error("Node with id '{node_id}' not found in execution plan")]
    NodeNotFound { node_id: NodeId },
    /// Node logic returned `Err` or panicked.
    #[error("{message}")]
    Invoke { node_id: NodeId, message: String },
    /// Node logic returned an object carrying `$error`.
    #[error("{message}")]
    Application {
        node_id: NodeId,
        message: String,
        values: OutputValues,
    },
    #[error("Error in node '{node_id}': {message}")]
    NodeFailed { node_id: NodeId, message: String },
}

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

impl ExecutorError {
    pub fn node_id(&self) -> Option<&NodeId> {
        match self {
            ExecutorError::MissingNodeLogic => None,
            ExecutorError::NodeNotFound { node_id }
            | ExecutorError::Invoke { node_id, .. }
            | ExecutorError::Application { node_id, .. }
            | ExecutorError::NodeFailed { node_id, .. } => Some(node_id),
        }
    }

    /// `$error` object for this error. Application errors give back the
    /// object the node logic returned, unmodified.
    pub fn into_values(self) -> OutputValues {
        match self {
            ExecutorError::Application { values, .. } => values,
            other => error_values(other.to_string()),
        }
    }

    fn in_node(node_id: &NodeId, source: ExecutorError) -> ExecutorError {
        ExecutorError::NodeFailed {
            node_id: node_id.clone(),
            message: source.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeRun {
    /// Outputs served from the cache without invoking.
    Cached(OutputValues),
    Invoked(OutputValues),
    /// Inputs not available yet; nothing was invoked.
    Waiting,
}

impl NodeRun {
    pub fn outputs(&self) -> Option<&OutputValues> {
        match self {
            NodeRun::Cached(values) | NodeRun::Invoked(values) => Some(values),
            NodeRun::Waiting => None,
        }
    }
    pub fn into_outputs(self) -> Option<OutputValues> {
        match self {
            NodeRun::Cached(values) | NodeRun::Invoked(values) => Some(values),
            NodeRun::Waiting => None,
        }
    }
    pub fn is_waiting(&self) -> bool {
        matches!(self, NodeRun::Waiting)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub state: NodeState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub elapsed_secs: f64,
    pub invoked_nodes: usize,
    pub cached_nodes: usize,
    pub waiting_nodes: usize,
}

#[derive(Debug)]
struct Invocation {
    node_id: NodeId,
    node_idx: usize,
    inputs: InputValues,
}

#[derive(Debug)]
enum Prepared {
    Cached(OutputValues),
    Waiting,
    Ready(Invocation),
}

/// Drives an [`ExecutionPlan`] stage by stage.
///
/// Owns the results cache and one [`NodeStateController`] per node that is
/// both referenced by the plan and present in the graph. Plan references to
/// nodes missing from the graph are dropped without error.
pub struct Executor {
    plan: Arc<ExecutionPlan>,
    graph: Arc<GraphDescriptor>,
    node_logic: Option<Arc<dyn NodeLogic>>,
    options: ExecutorOptions,

    cache: Cache,
    controllers: KeyIndexVec<NodeId, NodeStateController>,
    node_idx_by_id: HashMap<NodeId, usize>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("stages", &self.plan.stages.len())
            .field("nodes", &self.controllers.len())
            .field("cached", &self.cache.len())
            .field("has_node_logic", &self.node_logic.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Executor {
    pub fn new(
        plan: impl Into<Arc<ExecutionPlan>>,
        graph: impl Into<Arc<GraphDescriptor>>,
        node_logic: Option<Arc<dyn NodeLogic>>,
    ) -> Self {
        let plan = plan.into();
        let graph = graph.into();
        let node_idx_by_id = graph.node_index_by_id();
        let controllers = build_controllers(&plan, &node_idx_by_id);

        debug!(
            stages = plan.stages.len(),
            nodes = controllers.len(),
            "Executor created"
        );

        Self {
            plan,
            graph,
            node_logic,
            options: ExecutorOptions::default(),
            cache: Cache::default(),
            controllers,
            node_idx_by_id,
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }
    pub fn graph(&self) -> &Arc<GraphDescriptor> {
        &self.graph
    }
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
    pub(crate) fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }
    pub fn controller(&self, id: &str) -> Option<&NodeStateController> {
        self.controllers.by_key(id)
    }
    pub(crate) fn controller_mut(&mut self, id: &str) -> Option<&mut NodeStateController> {
        self.controllers.by_key_mut(id)
    }

    pub async fn run_node(&mut self, id: &str) -> ExecutorResult<NodeRun> {
        let logic = self.node_logic.clone().ok_or(ExecutorError::MissingNodeLogic)?;

        self.run_node_with(logic.as_ref(), id).await
    }

    pub async fn run(&mut self) -> ExecutorResult<RunStats> {
        let logic = self.node_logic.clone().ok_or(ExecutorError::MissingNodeLogic)?;
        let plan = Arc::clone(&self.plan);

        let start = Instant::now();
        let mut stats = RunStats::default();

        info!(stages = plan.stages.len(), "Running execution plan");

        for (stage_idx, stage) in plan.stages.iter().enumerate() {
            debug!(
                stage_idx,
                vm = stage.is_vm(),
                nodes = stage.nodes().len(),
                "Starting stage"
            );

            let result = match self.options.stage_dispatch {
                StageDispatch::Concurrent => {
                    self.run_stage_concurrent(logic.as_ref(), stage, &mut stats)
                        .await
                }
                StageDispatch::Sequential => {
                    self.run_stage_sequential(logic.as_ref(), stage, &mut stats)
                        .await
                }
            };

            if let Err(err) = result {
                warn!(stage_idx, "Execution plan aborted: {}", err);
                return Err(err);
            }
        }

        stats.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            invoked = stats.invoked_nodes,
            cached = stats.cached_nodes,
            waiting = stats.waiting_nodes,
            elapsed_secs = stats.elapsed_secs,
            "Execution plan finished"
        );

        Ok(stats)
    }

    /// Downstream results are left as they are.
    pub fn clear_results_for_node(&mut self, id: &str) {
        self.cache.delete(id);
        if let Some(controller) = self.controllers.by_key_mut(id) {
            controller.reset();
        }
        debug!(node_id = id, "Cleared node results");
    }

    pub fn clear_results(&mut self) {
        self.cache.clear();
        self.controllers
            .iter_mut()
            .for_each(|controller| controller.reset());
        debug!("Cleared all results");
    }

    pub fn status(&self) -> Vec<NodeStatus> {
        self.controllers
            .iter()
            .map(|controller| NodeStatus {
                id: controller.id().clone(),
                state: controller.state(),
            })
            .collect()
    }

    pub fn outputs(&self, id: &str) -> Option<OutputValues> {
        self.cache.get(id).map(to_output_values)
    }

    pub fn progress(&self) -> f32 {
        if self.controllers.is_empty() {
            return 1.0;
        }

        let settled = self
            .controllers
            .iter()
            .filter(|controller| controller.state().is_settled())
            .count();

        settled as f32 / self.controllers.len() as f32
    }

    pub fn working(&self) -> bool {
        self.controllers
            .iter()
            .any(|controller| controller.state() == NodeState::Running)
    }

    pub fn failed(&self) -> bool {
        self.controllers
            .iter()
            .any(|controller| controller.state() == NodeState::Failed)
    }

    async fn run_node_with(&mut self, logic: &dyn NodeLogic, id: &str) -> ExecutorResult<NodeRun> {
        match self.prepare(id)? {
            Prepared::Cached(values) => Ok(NodeRun::Cached(values)),
            Prepared::Waiting => Ok(NodeRun::Waiting),
            Prepared::Ready(invocation) => {
                let graph = Arc::clone(&self.graph);
                let node = &graph.nodes[invocation.node_idx];
                let result = invoke_guarded(logic, node, &invocation.inputs).await;

                self.finish(invocation.node_id, result)
            }
        }
    }

    async fn run_stage_sequential(
        &mut self,
        logic: &dyn NodeLogic,
        stage: &Stage,
        stats: &mut RunStats,
    ) -> ExecutorResult<()> {
        for info in stage.nodes() {
            if !self.is_tracked(&info.id) {
                continue;
            }

            match self.run_node_with(logic, &info.id).await {
                Ok(NodeRun::Cached(_)) => stats.cached_nodes += 1,
                Ok(NodeRun::Invoked(_)) => stats.invoked_nodes += 1,
                Ok(NodeRun::Waiting) => stats.waiting_nodes += 1,
                Err(err) => return Err(ExecutorError::in_node(&info.id, err)),
            }
        }

        Ok(())
    }

    // Every ready node is prepared before any of them is awaited, so the whole
    // stage is in flight at once. Results are applied in plan order.
    async fn run_stage_concurrent(
        &mut self,
        logic: &dyn NodeLogic,
        stage: &Stage,
        stats: &mut RunStats,
    ) -> ExecutorResult<()> {
        let mut pending: Vec<Invocation> = Vec::with_capacity(stage.nodes().len());

        for info in stage.nodes() {
            if !self.is_tracked(&info.id) {
                continue;
            }

            match self
                .prepare(&info.id)
                .map_err(|err| ExecutorError::in_node(&info.id, err))?
            {
                Prepared::Cached(_) => stats.cached_nodes += 1,
                Prepared::Waiting => stats.waiting_nodes += 1,
                Prepared::Ready(invocation) => pending.push(invocation),
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let graph = Arc::clone(&self.graph);
        let results = join_all(pending.iter().map(|invocation| {
            invoke_guarded(logic, &graph.nodes[invocation.node_idx], &invocation.inputs)
        }))
        .await;
        stats.invoked_nodes += pending.len();

        let mut first_error: Option<ExecutorError> = None;
        for (invocation, result) in pending.into_iter().zip(results) {
            let node_id = invocation.node_id.clone();
            if let Err(err) = self.finish(invocation.node_id, result) {
                if first_error.is_none() {
                    first_error = Some(ExecutorError::in_node(&node_id, err));
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_tracked(&self, id: &NodeId) -> bool {
        if self.controllers.contains_key(id) {
            return true;
        }

        trace!(node_id = %id, "Skipping node missing from graph");
        false
    }

    fn prepare(&mut self, id: &str) -> ExecutorResult<Prepared> {
        let Some(controller) = self.controllers.by_key_mut(id) else {
            return Err(ExecutorError::NodeNotFound {
                node_id: id.into(),
            });
        };

        // listed twice in one stage; the first dispatch is still in flight
        if controller.state() == NodeState::Running {
            return Ok(Prepared::Waiting);
        }

        controller.before_invoking(&self.cache);

        match controller.state() {
            NodeState::Cached => {
                debug!(node_id = id, "Using cached results");
                let values = self.cache.get(id).map(to_output_values).unwrap_or_default();
                Ok(Prepared::Cached(values))
            }
            NodeState::Ready => {
                let node_idx = *self
                    .node_idx_by_id
                    .get(id)
                    .ok_or_else(|| ExecutorError::NodeNotFound {
                        node_id: id.into(),
                    })?;
                let inputs = gather_inputs(&self.cache, controller);
                controller.start_running();
                debug!(node_id = id, inputs = inputs.len(), "Invoking node");

                Ok(Prepared::Ready(Invocation {
                    node_id: controller.id().clone(),
                    node_idx,
                    inputs,
                }))
            }
            state => {
                debug!(node_id = id, %state, "Inputs not available, skipping");
                Ok(Prepared::Waiting)
            }
        }
    }

    fn finish(
        &mut self,
        node_id: NodeId,
        result: std::result::Result<OutputValues, String>,
    ) -> ExecutorResult<NodeRun> {
        let outcome = match result {
            Err(message) => Err(ExecutorError::Invoke {
                node_id: node_id.clone(),
                message,
            }),
            Ok(values) => match error_message(&values) {
                Some(message) => Err(ExecutorError::Application {
                    node_id: node_id.clone(),
                    message,
                    values,
                }),
                None => Ok(values),
            },
        };

        let controller = self
            .controllers
            .by_key_mut(&node_id)
            .ok_or_else(|| ExecutorError::NodeNotFound {
                node_id: node_id.clone(),
            })?;
        controller.after_invoking(outcome.is_err());

        match outcome {
            Ok(values) => {
                debug!(node_id = %node_id, outputs = values.len(), "Node succeeded");
                self.cache.set(node_id, to_port_values(&values));
                Ok(NodeRun::Invoked(values))
            }
            Err(err) => {
                warn!(node_id = %node_id, "Node failed: {}", err);
                Err(err)
            }
        }
    }
}

fn build_controllers(
    plan: &ExecutionPlan,
    node_idx_by_id: &HashMap<NodeId, usize>,
) -> KeyIndexVec<NodeId, NodeStateController> {
    // records listed in a stage carry the full edge lists, stubs may not
    let mut stage_records: HashMap<&NodeId, &PlanNodeInfo> = HashMap::new();
    for stage in plan.stages.iter() {
        for info in stage.nodes() {
            stage_records.entry(&info.id).or_insert(info);
        }
    }

    let mut controllers = KeyIndexVec::default();
    for info in plan.node_infos() {
        if !node_idx_by_id.contains_key(&info.id) {
            continue;
        }

        let info = stage_records.get(&info.id).copied().unwrap_or(info);
        controllers.insert_with(&info.id, || {
            let mut controller = NodeStateController::new(info);
            controller.resolve_ports(|source| stage_records.get(source).copied());
            controller
        });
    }

    controllers.validate();
    controllers
}

fn gather_inputs(cache: &Cache, controller: &NodeStateController) -> InputValues {
    let mut inputs = InputValues::new();

    for binding in controller.bindings() {
        match cache.port(&binding.source, &binding.output) {
            Some(value) => {
                inputs.insert(binding.input.clone(), value.clone());
            }
            None => trace!(
                node_id = %controller.id(),
                source = %binding.source,
                port = %binding.output,
                "Producer output missing, input skipped"
            ),
        }
    }

    inputs
}

async fn invoke_guarded(
    logic: &dyn NodeLogic,
    node: &NodeDescriptor,
    inputs: &InputValues,
) -> std::result::Result<OutputValues, String> {
    let invocation = AssertUnwindSafe(async move { logic.invoke(node, inputs).await });

    match invocation.catch_unwind().await {
        Ok(Ok(values)) => Ok(values),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Node logic panicked".to_string()
    }
}
