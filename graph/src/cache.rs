use hashbrown::HashMap;

use crate::data::{PortValues, Value};
use crate::graph::NodeId;

/// Per-node outputs. An entry exists only for nodes that produced output,
/// and its presence is what marks a node as already executed.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    entries: HashMap<NodeId, PortValues>,
}

impl Cache {
    pub fn get(&self, id: &str) -> Option<&PortValues> {
        self.entries.get(id)
    }

    pub fn set(&mut self, id: impl Into<NodeId>, values: PortValues) {
        self.entries.insert(id.into(), values);
    }

    pub fn has(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn delete(&mut self, id: &str) -> Option<PortValues> {
        self.entries.remove(id)
    }

    pub fn port(&self, id: &str, port: &str) -> Option<&Value> {
        self.entries.get(id).and_then(|values| values.get(port))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
