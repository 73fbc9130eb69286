use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::cache::Cache;
use crate::data::PortName;
use crate::graph::NodeId;
use crate::plan::PlanNodeInfo;
use common::key_index_vec::KeyIndexKey;

/// Lifecycle of a tracked node.
///
/// ```text
/// Waiting ──► Ready ──► Running ──► Succeeded
///    │                      └─────► Failed
///    └──────► Cached
/// ```
/// Only an explicit reset moves a controller back to `Waiting`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeState {
    #[default]
    Waiting,
    Ready,
    Cached,
    Running,
    Succeeded,
    Failed,
}

impl NodeState {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            NodeState::Cached | NodeState::Succeeded | NodeState::Failed
        )
    }
}

/// One upstream edge resolved to ids and port names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBinding {
    pub source: NodeId,
    pub output: PortName,
    pub input: PortName,
}

#[derive(Debug, Clone)]
pub struct NodeStateController {
    id: NodeId,
    pub(crate) state: NodeState,
    bindings: Vec<InputBinding>,
}

impl KeyIndexKey<NodeId> for NodeStateController {
    fn key(&self) -> &NodeId {
        &self.id
    }
}

impl NodeStateController {
    pub fn new(info: &PlanNodeInfo) -> Self {
        let bindings = info
            .upstream
            .iter()
            .map(|edge| InputBinding {
                source: edge.from.id.clone(),
                output: edge.out.clone(),
                input: edge.input.clone(),
            })
            .collect();

        let mut controller = Self {
            id: info.id.clone(),
            state: NodeState::Waiting,
            bindings,
        };
        controller.resolve_ports(|source| {
            info.upstream
                .iter()
                .map(|edge| &edge.from)
                .find(|from| from.id == *source && !from.downstream.is_empty())
        });

        controller
    }

    /// Fills ports an upstream edge leaves out from the producer's matching
    /// downstream edge. The n-th binding from a producer pairs with the n-th
    /// downstream edge of that producer pointing at this node.
    pub(crate) fn resolve_ports<'a, F>(&mut self, producer_record: F)
    where
        F: Fn(&NodeId) -> Option<&'a PlanNodeInfo>,
    {
        let id = &self.id;
        let mut nth_by_source: HashMap<NodeId, usize> = HashMap::new();

        for binding in self.bindings.iter_mut() {
            let nth = nth_by_source.entry(binding.source.clone()).or_insert(0);
            let edge_idx = *nth;
            *nth += 1;

            if !binding.output.is_empty() && !binding.input.is_empty() {
                continue;
            }
            let Some(producer) = producer_record(&binding.source) else {
                continue;
            };
            let Some(edge) = producer
                .downstream
                .iter()
                .filter(|edge| edge.to.id == *id)
                .nth(edge_idx)
            else {
                continue;
            };

            if binding.output.is_empty() {
                binding.output = edge.out.clone();
            }
            if binding.input.is_empty() {
                binding.input = edge.input.clone();
            }
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn bindings(&self) -> &[InputBinding] {
        &self.bindings
    }

    /// Anything short of `Cached` or `Ready` leaves the state untouched.
    pub fn before_invoking(&mut self, cache: &Cache) {
        if cache.has(&self.id) {
            self.state = NodeState::Cached;
            return;
        }

        let inputs_available = self
            .bindings
            .iter()
            .all(|binding| cache.port(&binding.source, &binding.output).is_some());

        if inputs_available {
            self.state = NodeState::Ready;
        }
    }

    pub fn start_running(&mut self) {
        debug_assert_eq!(self.state, NodeState::Ready);
        self.state = NodeState::Running;
    }

    pub fn after_invoking(&mut self, has_error: bool) {
        self.state = if has_error {
            NodeState::Failed
        } else {
            NodeState::Succeeded
        };
    }

    pub fn reset(&mut self) {
        self.state = NodeState::Waiting;
    }
}
