//! Network-facing command handlers.
//!
//! Fetch failures from individual providers are logged by the pipeline;
//! handlers only report the aggregate outcome.

use std::sync::Arc;

use chrono::{Duration, Utc};
use quakes_core::{detect_low_power, Coordinate, LastOption, Provider};
use quakes_db::{QuakeFilter, QuakeStore};
use quakes_feed::{cancel_pair, register_device, CancelSignal, FetchKind, OperationResult};
use quakes_pipeline::{BackgroundFetch, DetailEnricher, EnrichOutcome, FetchOutcome};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::host::{HttpReachability, LogNotifier};
use crate::{Context, FetchCommands};

/// A signal that fires on the first Ctrl-C.
fn cancel_on_interrupt() -> CancelSignal {
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; cancelling");
            handle.cancel();
        }
    });
    signal
}

pub(crate) fn coordinate(lat: f64, lon: f64) -> anyhow::Result<Coordinate> {
    if !(-90.0..=90.0).contains(&lat) {
        anyhow::bail!("latitude {lat} is out of range");
    }
    if !(-180.0..=180.0).contains(&lon) {
        anyhow::bail!("longitude {lon} is out of range");
    }
    Ok(Coordinate::new(lat, lon))
}

/// Fetches one list and remembers it as the selection background fetches
/// replay.
pub(crate) async fn run_fetch(ctx: &Context, command: FetchCommands) -> anyhow::Result<()> {
    let snapshot = ctx
        .settings
        .snapshot(detect_low_power(ctx.config.low_power));
    let (kind, place) = match command {
        FetchCommands::World => (FetchKind::World, None),
        FetchCommands::Major { page } => (FetchKind::Major { page }, None),
        FetchCommands::Near { lat, lon } => {
            let center = coordinate(lat, lon)?;
            (FetchKind::location(center, &snapshot), Some(center))
        }
    };

    let now = Utc::now();
    let outcome = ctx
        .pipeline
        .fetch_quakes(&kind, &snapshot, now, &cancel_on_interrupt())
        .await?;

    match outcome {
        FetchOutcome::Merged(report) => {
            ctx.settings.update(|s| {
                match &kind {
                    FetchKind::World => s.last_option = Some(LastOption::World),
                    FetchKind::Major { .. } => s.last_option = Some(LastOption::Major),
                    _ => {}
                }
                s.last_searched_place = place;
                s.last_fetch_at = Some(now);
            })?;
            println!(
                "{}: decoded {}, inserted {}, updated {}, pruned {} ({} of {} providers answered)",
                kind.label(),
                report.decoded,
                report.summary.inserted,
                report.summary.updated,
                report.pruned,
                report.providers_completed,
                report.providers_completed + report.providers_failed,
            );
        }
        FetchOutcome::NoResult => anyhow::bail!("no provider returned a usable {} result", kind.label()),
        FetchOutcome::Cancelled => println!("{}: cancelled", kind.label()),
    }
    Ok(())
}

pub(crate) async fn run_detail(ctx: &Context, provider: Provider, id: &str) -> anyhow::Result<()> {
    let snapshot = ctx
        .settings
        .snapshot(detect_low_power(ctx.config.low_power));
    let enricher = DetailEnricher::new(ctx.pipeline.clone());
    let outcome = enricher
        .enrich(provider, id, &snapshot, Utc::now(), &cancel_on_interrupt())
        .await?;

    match outcome {
        EnrichOutcome::Enriched {
            nearby_cities,
            country_code,
        } => {
            println!(
                "{provider}/{id}: nearby cities {}, country {}",
                nearby_cities.map_or_else(|| "-".to_owned(), |n| n.to_string()),
                country_code.as_deref().unwrap_or("-"),
            );
        }
        EnrichOutcome::AlreadyEnriched => println!("{provider}/{id}: already enriched"),
        EnrichOutcome::NothingFound => println!("{provider}/{id}: lookups found nothing"),
        EnrichOutcome::AlreadyRunning => println!("{provider}/{id}: enrichment already running"),
        EnrichOutcome::NotFound => anyhow::bail!("quake {provider}/{id} is not in the store"),
        EnrichOutcome::Cancelled => println!("{provider}/{id}: cancelled"),
    }
    Ok(())
}

fn background(ctx: &Context) -> anyhow::Result<BackgroundFetch<HttpReachability, LogNotifier>> {
    let reachability = HttpReachability::new(&ctx.config.usgs_base_url)?;
    Ok(BackgroundFetch::new(
        ctx.pipeline.clone(),
        Arc::clone(&ctx.settings),
        reachability,
        LogNotifier,
    )
    .configured(&ctx.config))
}

pub(crate) async fn run_background_once(ctx: &Context) -> anyhow::Result<()> {
    let fetch = background(ctx)?;
    fetch.run(|result| println!("background fetch: {result}")).await;
    Ok(())
}

/// Runs background activations on `cron` until Ctrl-C.
pub(crate) async fn run_schedule(ctx: Context, cron: &str) -> anyhow::Result<()> {
    let fetch = Arc::new(background(&ctx)?);
    let mut scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let fetch = Arc::clone(&fetch);
        Box::pin(async move {
            fetch
                .run(|result| tracing::info!(%result, "scheduled background fetch"))
                .await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron, "background fetch scheduled");

    let mut changes = ctx.settings.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let settings = changes.borrow_and_update().clone();
            tracing::debug!(
                last_fetch_at = ?settings.last_fetch_at,
                last_push_at = ?settings.last_push_at,
                "settings changed"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal, stopping scheduler");
    scheduler.shutdown().await?;
    Ok(())
}

pub(crate) async fn run_list(
    store: &QuakeStore,
    min_magnitude: Option<f64>,
    provider: Option<Provider>,
    days: Option<i64>,
    limit: u32,
) -> anyhow::Result<()> {
    let filter = QuakeFilter {
        min_magnitude,
        provider,
        since: days.map(|d| Utc::now() - Duration::days(d)),
        limit: Some(limit),
    };
    let quakes = store.list_quakes(&filter).await?;
    if quakes.is_empty() {
        println!("no quakes stored");
        return Ok(());
    }
    for quake in &quakes {
        println!(
            "{}  M{:.1}  {:>5}  {}  {}{}",
            quake.occurred_at.format("%Y-%m-%d %H:%M"),
            quake.magnitude,
            quake.provider,
            quake.identifier,
            quake.name,
            quake
                .country_code
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default(),
        );
    }
    let total = store
        .count_quakes(&QuakeFilter {
            limit: None,
            ..filter
        })
        .await?;
    println!("{} of {total} shown", quakes.len());
    Ok(())
}

pub(crate) async fn run_register_device(
    ctx: &Context,
    token: &str,
    lat: f64,
    lon: f64,
) -> anyhow::Result<()> {
    let location = coordinate(lat, lon)?;
    match register_device(
        ctx.pipeline.client(),
        &ctx.config.device_registration_url,
        token,
        location,
        &cancel_on_interrupt(),
    )
    .await
    {
        OperationResult::Decoded(()) => {
            ctx.settings
                .update(|s| s.push_token = Some(token.to_owned()))?;
            println!("device registered");
            Ok(())
        }
        OperationResult::NoResult(err) => Err(anyhow::anyhow!("device registration failed: {err}")),
        OperationResult::Cancelled => {
            println!("device registration cancelled");
            Ok(())
        }
    }
}
