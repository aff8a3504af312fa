//! Fetch-and-merge: one graph node per provider, one merge per fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quakes_core::{AppConfig, ParsedQuake, Provider, SettingsSnapshot};
use quakes_db::{MergeSummary, QuakeStore};
use quakes_feed::{CancelSignal, Endpoints, FeedClient, FetchContext, FetchKind, FetchOutput};

use crate::graph::{FetchGraph, GraphExecutor, GraphReport, NodeOutcome};
use crate::PipelineError;

/// Result of a successful merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Quakes decoded across all completed provider nodes.
    pub decoded: usize,
    pub summary: MergeSummary,
    pub pruned: u64,
    pub providers_completed: usize,
    pub providers_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// At least one provider decoded a result and it was merged, even if
    /// that result was empty.
    Merged(FetchReport),
    /// Every provider node failed or was skipped.
    NoResult,
    Cancelled,
}

/// Shared fetch entry point used by the coordinator, the detail enricher
/// and the CLI.
#[derive(Clone)]
pub struct FetchPipeline {
    client: FeedClient,
    endpoints: Endpoints,
    store: Arc<QuakeStore>,
    max_concurrent: usize,
}

impl FetchPipeline {
    #[must_use]
    pub fn new(
        client: FeedClient,
        endpoints: Endpoints,
        store: Arc<QuakeStore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            endpoints,
            store,
            max_concurrent: max_concurrent.max(1),
        }
    }

    #[must_use]
    pub fn from_config(
        config: &AppConfig,
        client: FeedClient,
        endpoints: Endpoints,
        store: Arc<QuakeStore>,
    ) -> Self {
        Self::new(client, endpoints, store, config.max_concurrent_fetches)
    }

    #[must_use]
    pub fn client(&self) -> &FeedClient {
        &self.client
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn store(&self) -> &Arc<QuakeStore> {
        &self.store
    }

    /// Runs a graph built by the caller against this pipeline's client.
    pub async fn execute(
        &self,
        graph: &FetchGraph,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> GraphReport {
        let ctx = FetchContext::new(snapshot, now);
        GraphExecutor::new(&self.client, &self.endpoints, ctx, self.max_concurrent)
            .execute(graph, cancel)
            .await
    }

    /// Fetches a quake list from every enabled provider that offers `kind`,
    /// merges whatever decoded and prunes by the kind's retention window.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotAQuakeList`] for kinds that do not yield
    /// quakes, or [`PipelineError::Store`] if the merge or prune fails.
    pub async fn fetch_quakes(
        &self,
        kind: &FetchKind,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> Result<FetchOutcome, PipelineError> {
        let Some(retention) = kind.retention(now) else {
            return Err(PipelineError::NotAQuakeList(kind.label()));
        };

        let mut graph = FetchGraph::new();
        for provider in providers_for(kind, &snapshot.settings.providers) {
            graph.add(kind.clone(), provider);
        }

        let report = self.execute(&graph, snapshot, now, cancel).await;

        let mut quakes: Vec<ParsedQuake> = Vec::new();
        let mut completed = 0;
        let mut failed = 0;
        let mut cancelled = false;
        for (_, outcome) in report.into_outcomes() {
            match outcome {
                NodeOutcome::Completed(FetchOutput::Quakes(batch)) => {
                    completed += 1;
                    quakes.extend(batch);
                }
                NodeOutcome::Completed(_) | NodeOutcome::Failed(_) | NodeOutcome::Skipped => {
                    failed += 1;
                }
                NodeOutcome::Cancelled => cancelled = true,
            }
        }

        if completed == 0 {
            let outcome = if cancelled {
                FetchOutcome::Cancelled
            } else {
                FetchOutcome::NoResult
            };
            tracing::info!(kind = kind.label(), ?outcome, "fetch produced no result");
            return Ok(outcome);
        }

        let decoded = quakes.len();
        let summary = self.store.merge_quakes(&quakes).await?;
        let pruned = self.store.prune_older_than(now - retention).await?;
        let report = FetchReport {
            decoded,
            summary,
            pruned,
            providers_completed: completed,
            providers_failed: failed,
        };
        tracing::info!(
            kind = kind.label(),
            decoded,
            inserted = summary.inserted,
            updated = summary.updated,
            pruned,
            providers_failed = failed,
            "fetch merged"
        );
        Ok(FetchOutcome::Merged(report))
    }

    /// Runs a notification count query. `None` means the query produced no
    /// result.
    pub async fn count_quakes(
        &self,
        kind: FetchKind,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> Option<u64> {
        let mut graph = FetchGraph::new();
        let node = graph.add(kind, Provider::Usgs);
        let report = self.execute(&graph, snapshot, now, cancel).await;
        match report.outcome(node)? {
            NodeOutcome::Completed(FetchOutput::Count(n)) => Some(*n),
            _ => None,
        }
    }
}

/// Enabled providers that offer `kind`, falling back to USGS when none do.
fn providers_for(kind: &FetchKind, enabled: &[Provider]) -> Vec<Provider> {
    let mut providers: Vec<Provider> = Vec::new();
    for &provider in enabled {
        if kind.supports(provider) && !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    if providers.is_empty() && kind.supports(Provider::Usgs) {
        providers.push(Provider::Usgs);
    }
    providers
}
