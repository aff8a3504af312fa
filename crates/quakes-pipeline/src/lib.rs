//! Fetch orchestration: the dependency graph executor, fetch-and-merge,
//! detail enrichment and the background fetch coordinator.

pub mod coordinator;
pub mod enrich;
pub mod graph;
pub mod pipeline;

use thiserror::Error;

pub use coordinator::{BackgroundFetch, BackgroundFetchResult, Notifier, Reachability};
pub use enrich::{DetailEnricher, EnrichOutcome};
pub use graph::{
    FetchGraph, FetchNode, GraphError, GraphExecutor, GraphReport, NodeId, NodeOutcome,
};
pub use pipeline::{FetchOutcome, FetchPipeline, FetchReport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] quakes_db::DbError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("{0} fetches do not produce a quake list")]
    NotAQuakeList(&'static str),
}
