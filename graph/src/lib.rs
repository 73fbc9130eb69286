pub mod cache;
pub mod data;
pub mod executor;
pub mod graph;
pub mod node_logic;
pub mod node_state;
pub mod options;
pub mod plan;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::cache::Cache;
    pub use crate::data::{InputValues, OutputValues, PortValues, Value, ERROR_KEY};
    pub use crate::executor::{
        Executor, ExecutorError, ExecutorResult, NodeRun, NodeStatus, RunStats,
    };
    pub use crate::graph::{Edge, GraphDescriptor, NodeDescriptor, NodeId};
    pub use crate::node_logic::{EchoLogic, NodeLambda, NodeLogic};
    pub use crate::node_state::NodeState;
    pub use crate::options::{ExecutorOptions, StageDispatch};
    pub use crate::plan::{ExecutionPlan, PlanNodeInfo, Stage};
}
