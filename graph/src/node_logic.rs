use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{InputValues, OutputValues};
use crate::graph::NodeDescriptor;

/// Business logic of the nodes, supplied by the host application.
///
/// An `Err` is treated like a thrown exception and a result containing the
/// `$error` key as a failure reported by the node itself. Logic for a VM node
/// may drive a nested executor of its own.
#[async_trait]
pub trait NodeLogic: Send + Sync {
    async fn invoke(
        &self,
        node: &NodeDescriptor,
        inputs: &InputValues,
    ) -> anyhow::Result<OutputValues>;
}

pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<OutputValues>> + Send + 'a>>;

pub trait AsyncNodeFn:
    for<'a> Fn(&'a NodeDescriptor, &'a InputValues) -> InvokeFuture<'a> + Send + Sync + 'static
{
}

impl<T> AsyncNodeFn for T where
    T: for<'a> Fn(&'a NodeDescriptor, &'a InputValues) -> InvokeFuture<'a> + Send + Sync + 'static
{
}

/// Closure-backed [`NodeLogic`].
#[derive(Clone)]
pub struct NodeLambda {
    inner: Arc<dyn AsyncNodeFn>,
}

impl NodeLambda {
    pub fn new<F>(lambda: F) -> Self
    where
        F: for<'a> Fn(&'a NodeDescriptor, &'a InputValues) -> InvokeFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        Self {
            inner: Arc::new(lambda),
        }
    }

    pub fn into_logic(self) -> Arc<dyn NodeLogic> {
        Arc::new(self)
    }
}

impl std::fmt::Debug for NodeLambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeLambda").finish_non_exhaustive()
    }
}

#[async_trait]
impl NodeLogic for NodeLambda {
    async fn invoke(
        &self,
        node: &NodeDescriptor,
        inputs: &InputValues,
    ) -> anyhow::Result<OutputValues> {
        (self.inner)(node, inputs).await
    }
}

/// Echoes its inputs merged over the node's configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoLogic;

#[async_trait]
impl NodeLogic for EchoLogic {
    async fn invoke(
        &self,
        node: &NodeDescriptor,
        inputs: &InputValues,
    ) -> anyhow::Result<OutputValues> {
        let mut outputs = node.configuration.clone().unwrap_or_default();
        outputs.extend(
            inputs
                .iter()
                .map(|(port, value)| (port.clone(), value.clone())),
        );

        Ok(outputs)
    }
}
