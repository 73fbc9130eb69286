use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::data::PortName;
use common::{id_type, FileFormat};

id_type!(NodeId);

#[derive(Clone, Default, PartialEq, Debug, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub out: PortName,
    #[serde(rename = "in", default)]
    pub input: PortName,
}

/// Authoritative node list of a board.
///
/// The executor only reads `nodes`; wiring for execution comes from the plan.
#[derive(Clone, Default, Debug, Serialize, Deserialize)]
pub struct GraphDescriptor {
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<Edge>,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            configuration: None,
            metadata: None,
        }
    }
}

impl Edge {
    pub fn new(
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        out: impl Into<PortName>,
        input: impl Into<PortName>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            out: out.into(),
            input: input.into(),
        }
    }
}

impl GraphDescriptor {
    pub fn new(nodes: Vec<NodeDescriptor>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node_by_id(&self, id: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_index_by_id(&self) -> HashMap<NodeId, usize> {
        let mut map = HashMap::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            // first occurrence wins, matching node_by_id
            map.entry(node.id.clone()).or_insert(index);
        }
        map
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let graph: GraphDescriptor = common::deserialize(yaml, FileFormat::Yaml)?;
        graph.validate()?;

        Ok(graph)
    }
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let graph: GraphDescriptor = common::deserialize(json, FileFormat::Json)?;
        graph.validate()?;

        Ok(graph)
    }
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let graph: GraphDescriptor = common::deserialize_file(path)?;
        graph.validate()?;

        Ok(graph)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for node in self.nodes.iter() {
            if node.id.is_empty() {
                return Err(anyhow::Error::msg("Node has empty id"));
            }
        }

        Ok(())
    }
}
