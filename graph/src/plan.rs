use std::path::Path;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::data::PortName;
use crate::graph::NodeId;
use common::FileFormat;

/// Edge into a node. `out` names the producer's output port, `in` the
/// consumer's input port.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct UpstreamEdge {
    pub from: PlanNodeInfo,
    #[serde(default)]
    pub out: PortName,
    #[serde(rename = "in", default)]
    pub input: PortName,
}

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct DownstreamEdge {
    pub to: PlanNodeInfo,
    #[serde(default)]
    pub out: PortName,
    #[serde(rename = "in", default)]
    pub input: PortName,
}

/// Plan-level record of a node and its local edge topology.
///
/// The same node can appear several times: fully populated in its own stage
/// and as a stub with empty edge lists inside a neighbour's edges. Records are
/// always matched by `id`.
#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct PlanNodeInfo {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<UpstreamEdge>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream: Vec<DownstreamEdge>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stage {
    /// Mutually independent nodes.
    Static { nodes: Vec<PlanNodeInfo> },
    /// Single node whose inner topology is only known to its logic.
    Vm { node: PlanNodeInfo },
}

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub stages: Vec<Stage>,
}

impl UpstreamEdge {
    pub fn new(from: PlanNodeInfo, out: impl Into<PortName>, input: impl Into<PortName>) -> Self {
        Self {
            from,
            out: out.into(),
            input: input.into(),
        }
    }
}

impl DownstreamEdge {
    pub fn new(to: PlanNodeInfo, out: impl Into<PortName>, input: impl Into<PortName>) -> Self {
        Self {
            to,
            out: out.into(),
            input: input.into(),
        }
    }
}

impl PlanNodeInfo {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            upstream: Vec::new(),
            downstream: Vec::new(),
        }
    }

    /// Record with the same id and no edges, as found inside edge lists.
    pub fn stub(&self) -> Self {
        Self::new(self.id.clone())
    }

    pub fn with_upstream(
        mut self,
        from: impl Into<NodeId>,
        out: impl Into<PortName>,
        input: impl Into<PortName>,
    ) -> Self {
        self.upstream
            .push(UpstreamEdge::new(PlanNodeInfo::new(from), out, input));
        self
    }

    pub fn with_downstream(
        mut self,
        to: impl Into<NodeId>,
        out: impl Into<PortName>,
        input: impl Into<PortName>,
    ) -> Self {
        self.downstream
            .push(DownstreamEdge::new(PlanNodeInfo::new(to), out, input));
        self
    }
}

impl Stage {
    pub fn nodes(&self) -> &[PlanNodeInfo] {
        match self {
            Stage::Static { nodes } => nodes.as_slice(),
            Stage::Vm { node } => std::slice::from_ref(node),
        }
    }

    pub fn is_vm(&self) -> bool {
        matches!(self, Stage::Vm { .. })
    }
}

impl ExecutionPlan {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Every record referenced by the plan, in plan order: each stage node
    /// followed by the records reachable through its edge lists.
    pub fn node_infos(&self) -> Vec<&PlanNodeInfo> {
        let mut infos: Vec<&PlanNodeInfo> = Vec::new();
        let mut stack: Vec<&PlanNodeInfo> = Vec::new();

        for stage in self.stages.iter() {
            for node in stage.nodes() {
                stack.push(node);

                while let Some(info) = stack.pop() {
                    infos.push(info);

                    // reversed so that the first edge is visited first
                    for edge in info.downstream.iter().rev() {
                        stack.push(&edge.to);
                    }
                    for edge in info.upstream.iter().rev() {
                        stack.push(&edge.from);
                    }
                }
            }
        }

        infos
    }

    /// Distinct node ids in first-reference order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut seen: HashSet<&NodeId> = HashSet::new();

        self.node_infos()
            .into_iter()
            .filter(|info| seen.insert(&info.id))
            .map(|info| info.id.clone())
            .collect()
    }

    pub fn stage_node_ids(&self, stage_idx: usize) -> Vec<NodeId> {
        self.stages
            .get(stage_idx)
            .map(|stage| stage.nodes().iter().map(|info| info.id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(common::deserialize(yaml, FileFormat::Yaml)?)
    }
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(common::deserialize(json, FileFormat::Json)?)
    }
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(common::deserialize_file(path)?)
    }
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(common::serialize(self, FileFormat::Yaml)?)
    }
}
