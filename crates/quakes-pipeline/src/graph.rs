//! A small DAG of fetch nodes and the executor that walks it.
//!
//! Each node names the upstream node whose decoded output it consumes.
//! Dependencies must already be in the graph when a node is added, so the
//! graph is acyclic by construction and insertion order is a valid
//! topological order.
//!
//! The executor runs the graph in waves: every node whose upstream has
//! settled is started, up to `max_concurrent` at a time. A node whose
//! upstream failed, was skipped, or produced no usable input is skipped
//! without running.

use futures::stream::{self, StreamExt};
use quakes_core::Provider;
use quakes_feed::{
    CancelSignal, Endpoints, FeedClient, FeedError, FetchContext, FetchKind, FetchOutput,
    OperationResult,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node depends on {0:?}, which is not in the graph")]
    UnknownDependency(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchNode {
    pub kind: FetchKind,
    pub provider: Provider,
    /// Upstream node whose output is this node's input.
    pub input: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct FetchGraph {
    nodes: Vec<FetchNode>,
}

impl FetchGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an independent node.
    pub fn add(&mut self, kind: FetchKind, provider: Provider) -> NodeId {
        self.nodes.push(FetchNode {
            kind,
            provider,
            input: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Adds a node that waits for, and consumes the output of, `upstream`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownDependency`] if `upstream` was not
    /// returned by this graph.
    pub fn add_dependent(
        &mut self,
        kind: FetchKind,
        provider: Provider,
        upstream: NodeId,
    ) -> Result<NodeId, GraphError> {
        if upstream.0 >= self.nodes.len() {
            return Err(GraphError::UnknownDependency(upstream));
        }
        self.nodes.push(FetchNode {
            kind,
            provider,
            input: Some(upstream),
        });
        Ok(NodeId(self.nodes.len() - 1))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Final state of one node.
#[derive(Debug)]
pub enum NodeOutcome {
    Completed(FetchOutput),
    /// Ran and produced no result. Already logged.
    Failed(FeedError),
    /// Not run because its input was unavailable.
    Skipped,
    /// Not run, or its result discarded, because the graph was cancelled.
    Cancelled,
}

impl NodeOutcome {
    #[must_use]
    pub fn output(&self) -> Option<&FetchOutput> {
        match self {
            NodeOutcome::Completed(output) => Some(output),
            NodeOutcome::Failed(_) | NodeOutcome::Skipped | NodeOutcome::Cancelled => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, NodeOutcome::Completed(_))
    }
}

/// Outcomes for every node, indexed by [`NodeId`]. Produced once, after all
/// nodes have settled.
#[derive(Debug)]
pub struct GraphReport {
    outcomes: Vec<NodeOutcome>,
}

impl GraphReport {
    #[must_use]
    pub fn outcome(&self, id: NodeId) -> Option<&NodeOutcome> {
        self.outcomes.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeOutcome)> {
        self.outcomes
            .iter()
            .enumerate()
            .map(|(i, outcome)| (NodeId(i), outcome))
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    pub fn into_outcomes(self) -> impl Iterator<Item = (NodeId, NodeOutcome)> {
        self.outcomes
            .into_iter()
            .enumerate()
            .map(|(i, outcome)| (NodeId(i), outcome))
    }
}

/// Runs [`FetchGraph`]s against one client and endpoint set.
pub struct GraphExecutor<'a> {
    client: &'a FeedClient,
    endpoints: &'a Endpoints,
    ctx: FetchContext,
    max_concurrent: usize,
}

impl<'a> GraphExecutor<'a> {
    #[must_use]
    pub fn new(
        client: &'a FeedClient,
        endpoints: &'a Endpoints,
        ctx: FetchContext,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            endpoints,
            ctx,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Executes every node and returns once all have settled.
    pub async fn execute(&self, graph: &FetchGraph, cancel: &CancelSignal) -> GraphReport {
        let mut outcomes: Vec<Option<NodeOutcome>> =
            std::iter::repeat_with(|| None).take(graph.len()).collect();

        loop {
            let pending: Vec<usize> = (0..graph.len()).filter(|&i| outcomes[i].is_none()).collect();
            if pending.is_empty() {
                break;
            }

            if cancel.is_cancelled() {
                for i in pending {
                    outcomes[i] = Some(NodeOutcome::Cancelled);
                }
                break;
            }

            let mut ready = Vec::new();
            for i in pending {
                let node = &graph.nodes[i];
                match node.input {
                    None => ready.push(i),
                    Some(upstream) => match &outcomes[upstream.0] {
                        None => {}
                        Some(NodeOutcome::Completed(_)) => ready.push(i),
                        Some(NodeOutcome::Cancelled) => outcomes[i] = Some(NodeOutcome::Cancelled),
                        Some(NodeOutcome::Failed(_) | NodeOutcome::Skipped) => {
                            tracing::debug!(
                                node = i,
                                kind = node.kind.label(),
                                upstream = upstream.0,
                                "skipping node; upstream produced no result"
                            );
                            outcomes[i] = Some(NodeOutcome::Skipped);
                        }
                    },
                }
            }

            if ready.is_empty() {
                continue;
            }

            let settled: Vec<(usize, NodeOutcome)> = {
                let done = &outcomes;
                stream::iter(ready)
                    .map(|i| {
                        let node = &graph.nodes[i];
                        let input = node
                            .input
                            .and_then(|up| done[up.0].as_ref())
                            .and_then(NodeOutcome::output);
                        async move { (i, self.run_node(i, node, input, cancel).await) }
                    })
                    .buffer_unordered(self.max_concurrent)
                    .collect()
                    .await
            };
            for (i, outcome) in settled {
                outcomes[i] = Some(outcome);
            }
        }

        GraphReport {
            outcomes: outcomes
                .into_iter()
                .map(|o| o.unwrap_or(NodeOutcome::Cancelled))
                .collect(),
        }
    }

    async fn run_node(
        &self,
        index: usize,
        node: &FetchNode,
        input: Option<&FetchOutput>,
        cancel: &CancelSignal,
    ) -> NodeOutcome {
        let request = match node
            .kind
            .request(node.provider, self.endpoints, &self.ctx, input)
        {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!(node = index, kind = node.kind.label(), "no usable input; skipping");
                return NodeOutcome::Skipped;
            }
            Err(err) => {
                tracing::warn!(node = index, kind = node.kind.label(), error = %err, "request not built");
                return NodeOutcome::Failed(err);
            }
        };

        tracing::debug!(
            node = index,
            kind = node.kind.label(),
            provider = %node.provider,
            url = %request.url(),
            "running fetch node"
        );
        let kind = &node.kind;
        let provider = node.provider;
        match self
            .client
            .perform(&request, cancel, |body| kind.decode(provider, body))
            .await
        {
            OperationResult::Decoded(output) => NodeOutcome::Completed(output),
            OperationResult::NoResult(err) => NodeOutcome::Failed(err),
            OperationResult::Cancelled => NodeOutcome::Cancelled,
        }
    }
}
