//! Post-hoc enrichment of a stored quake: nearby cities through the
//! detail -> nearby-cities chain, country code through the geocoder.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use quakes_core::{place_name, Provider, SettingsSnapshot};
use quakes_db::Enrichment;
use quakes_feed::{CancelSignal, FetchKind, FetchOutput};

use crate::graph::{FetchGraph, NodeOutcome};
use crate::pipeline::FetchPipeline;
use crate::PipelineError;

type QuakeKey = (Provider, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Fields written. Counts what was fetched this time.
    Enriched {
        nearby_cities: Option<usize>,
        country_code: Option<String>,
    },
    /// Both fields already set; nothing fetched.
    AlreadyEnriched,
    /// Lookups ran but none produced a value.
    NothingFound,
    /// Another chain for this quake is still running.
    AlreadyRunning,
    NotFound,
    Cancelled,
}

/// Runs at most one enrichment chain per quake at a time.
#[derive(Clone)]
pub struct DetailEnricher {
    pipeline: FetchPipeline,
    in_flight: Arc<Mutex<HashSet<QuakeKey>>>,
}

struct InFlight<'a> {
    set: &'a Mutex<HashSet<QuakeKey>>,
    key: QuakeKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl DetailEnricher {
    #[must_use]
    pub fn new(pipeline: FetchPipeline) -> Self {
        Self {
            pipeline,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn claim(&self, provider: Provider, identifier: &str) -> Option<InFlight<'_>> {
        let key = (provider, identifier.to_owned());
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            key,
        })
    }

    /// Fetches whichever enrichment fields the stored quake is missing and
    /// writes the ones that resolved.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the store cannot be read or
    /// written. Fetch failures are not errors; they leave fields unset.
    pub async fn enrich(
        &self,
        provider: Provider,
        identifier: &str,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
        cancel: &CancelSignal,
    ) -> Result<EnrichOutcome, PipelineError> {
        let Some(_claim) = self.claim(provider, identifier) else {
            tracing::debug!(%provider, identifier, "enrichment already running");
            return Ok(EnrichOutcome::AlreadyRunning);
        };

        let store = self.pipeline.store();
        let Some(quake) = store.get_quake(provider, identifier).await? else {
            return Ok(EnrichOutcome::NotFound);
        };

        let mut graph = FetchGraph::new();
        let mut cities_node = None;
        if quake.nearby_cities.is_none() {
            if let Some(url) = quake.detail_url.clone() {
                let detail = graph.add(FetchKind::Detail { url }, Provider::Usgs);
                cities_node =
                    Some(graph.add_dependent(FetchKind::NearbyCities, Provider::Usgs, detail)?);
            }
        }
        let country_node = if quake.country_code.is_none() {
            let place = place_name(&quake.name);
            (!place.is_empty()).then(|| {
                graph.add(
                    FetchKind::CountryCode {
                        place: place.to_owned(),
                    },
                    provider,
                )
            })
        } else {
            None
        };

        if graph.is_empty() {
            return Ok(EnrichOutcome::AlreadyEnriched);
        }

        let report = self.pipeline.execute(&graph, snapshot, now, cancel).await;
        if cancel.is_cancelled() {
            return Ok(EnrichOutcome::Cancelled);
        }

        let nearby_cities = cities_node
            .and_then(|id| report.outcome(id))
            .and_then(|outcome| match outcome {
                // An empty list is left unset so a later run can retry.
                NodeOutcome::Completed(FetchOutput::NearbyCities(cities)) if !cities.is_empty() => {
                    Some(cities.clone())
                }
                _ => None,
            });
        let country_code = country_node
            .and_then(|id| report.outcome(id))
            .and_then(|outcome| match outcome {
                NodeOutcome::Completed(FetchOutput::CountryCode(code)) => code.clone(),
                _ => None,
            });

        let enrichment = Enrichment {
            nearby_cities,
            country_code,
        };
        if enrichment.is_empty() {
            tracing::info!(%provider, identifier, "enrichment lookups found nothing");
            return Ok(EnrichOutcome::NothingFound);
        }

        if !store.enrich_quake(provider, identifier, &enrichment).await? {
            return Ok(EnrichOutcome::NotFound);
        }

        let outcome = EnrichOutcome::Enriched {
            nearby_cities: enrichment.nearby_cities.as_ref().map(Vec::len),
            country_code: enrichment.country_code,
        };
        tracing::info!(%provider, identifier, ?outcome, "quake enriched");
        Ok(outcome)
    }
}
