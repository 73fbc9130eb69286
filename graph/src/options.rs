use std::path::Path;

use serde::{Deserialize, Serialize};

use common::FileFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageDispatch {
    /// All ready nodes of a static stage are awaited together.
    #[default]
    Concurrent,
    /// Nodes of a stage are invoked one after another, in plan order.
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    pub stage_dispatch: StageDispatch,
}

impl ExecutorOptions {
    pub fn sequential() -> Self {
        Self {
            stage_dispatch: StageDispatch::Sequential,
        }
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(common::deserialize(yaml, FileFormat::Yaml)?)
    }
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Ok(common::deserialize_file(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_concurrent() -> anyhow::Result<()> {
        assert_eq!(ExecutorOptions::default().stage_dispatch, StageDispatch::Concurrent);
        assert_eq!(ExecutorOptions::from_yaml("{}")?, ExecutorOptions::default());

        let options = ExecutorOptions::from_yaml("stage_dispatch: sequential\n")?;
        assert_eq!(options, ExecutorOptions::sequential());

        Ok(())
    }
}
