//! Background fetch: pick what to refresh from the persisted settings, run
//! it, and report one of three results to the host scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quakes_core::{
    detect_low_power, AppConfig, EmptyResultPolicy, LastOption, LowPowerMode, Settings,
    SettingsSnapshot, SettingsStore,
};
use quakes_feed::{CancelSignal, FetchKind};

use crate::pipeline::{FetchOutcome, FetchPipeline};

/// Days that must pass between two count notifications.
const NOTIFICATION_INTERVAL_DAYS: i64 = 6;
/// Count window used when no notification has been posted yet.
const DEFAULT_COUNT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

impl std::fmt::Display for BackgroundFetchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundFetchResult::NewData => write!(f, "new-data"),
            BackgroundFetchResult::NoData => write!(f, "no-data"),
            BackgroundFetchResult::Failed => write!(f, "failed"),
        }
    }
}

/// Whether the network is worth trying at all.
pub trait Reachability: Send + Sync {
    fn is_reachable(&self) -> impl Future<Output = bool> + Send;
}

/// Delivers a local notification. Fire and forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> impl Future<Output = ()> + Send;
}

pub struct BackgroundFetch<R, N> {
    pipeline: FetchPipeline,
    settings: Arc<SettingsStore>,
    reachability: R,
    notifier: N,
    budget: Duration,
    policy: EmptyResultPolicy,
    low_power: LowPowerMode,
}

impl<R: Reachability, N: Notifier> BackgroundFetch<R, N> {
    #[must_use]
    pub fn new(
        pipeline: FetchPipeline,
        settings: Arc<SettingsStore>,
        reachability: R,
        notifier: N,
    ) -> Self {
        Self {
            pipeline,
            settings,
            reachability,
            notifier,
            budget: Duration::from_secs(30),
            policy: EmptyResultPolicy::default(),
            low_power: LowPowerMode::default(),
        }
    }

    /// Applies the budget, empty-result policy and low-power source from
    /// `config`.
    #[must_use]
    pub fn configured(mut self, config: &AppConfig) -> Self {
        self.budget = Duration::from_secs(config.background_budget_secs);
        self.policy = config.empty_result_policy;
        self.low_power = config.low_power;
        self
    }

    #[must_use]
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: EmptyResultPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_low_power(mut self, low_power: LowPowerMode) -> Self {
        self.low_power = low_power;
        self
    }

    /// Runs one activation and hands the result to `completion`, exactly once.
    pub async fn run<F>(&self, completion: F)
    where
        F: FnOnce(BackgroundFetchResult),
    {
        completion(self.run_at(Utc::now()).await);
    }

    /// Runs one activation as of `now`, bounded by the configured budget.
    pub async fn run_at(&self, now: DateTime<Utc>) -> BackgroundFetchResult {
        let result = match tokio::time::timeout(self.budget, self.decide(now)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(budget_secs = self.budget.as_secs(), "background fetch over budget");
                BackgroundFetchResult::Failed
            }
        };
        tracing::info!(%result, "background fetch finished");
        result
    }

    async fn decide(&self, now: DateTime<Utc>) -> BackgroundFetchResult {
        if !self.reachability.is_reachable().await {
            tracing::info!("network unreachable");
            return BackgroundFetchResult::Failed;
        }

        let snapshot = self.settings.snapshot(detect_low_power(self.low_power));
        let settings = &snapshot.settings;

        if let Some(place) = settings.last_searched_place {
            return self
                .fetch(FetchKind::location(place, &snapshot), &snapshot, now)
                .await;
        }

        match settings.last_option {
            Some(LastOption::Nearby) => match settings.cached_place {
                Some(place) => {
                    self.fetch(FetchKind::location(place, &snapshot), &snapshot, now)
                        .await
                }
                None => {
                    tracing::info!("nearby option set but no cached place");
                    BackgroundFetchResult::Failed
                }
            },
            Some(LastOption::World) => self.fetch(FetchKind::World, &snapshot, now).await,
            Some(LastOption::Major) => {
                self.fetch(FetchKind::Major { page: 0 }, &snapshot, now)
                    .await
            }
            None => self.notify_if_due(&snapshot, now).await,
        }
    }

    async fn fetch(
        &self,
        kind: FetchKind,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
    ) -> BackgroundFetchResult {
        let outcome = self
            .pipeline
            .fetch_quakes(&kind, snapshot, now, &CancelSignal::never())
            .await;
        match outcome {
            Ok(FetchOutcome::Merged(report)) => {
                if report.decoded == 0 && self.policy == EmptyResultPolicy::NoData {
                    return BackgroundFetchResult::NoData;
                }
                self.record("last fetch time", move |s| s.last_fetch_at = Some(now))
                    .await;
                BackgroundFetchResult::NewData
            }
            Ok(FetchOutcome::NoResult | FetchOutcome::Cancelled) => BackgroundFetchResult::Failed,
            Err(err) => {
                tracing::error!(kind = kind.label(), error = %err, "fetch could not be merged");
                BackgroundFetchResult::Failed
            }
        }
    }

    /// Writes the settings file on the blocking pool.
    async fn record<F>(&self, what: &'static str, mutate: F)
    where
        F: FnOnce(&mut Settings) + Send + 'static,
    {
        let settings = Arc::clone(&self.settings);
        match tokio::task::spawn_blocking(move || settings.update(mutate)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, what, "could not record settings"),
            Err(err) => tracing::warn!(error = %err, what, "settings write task failed"),
        }
    }

    async fn notify_if_due(
        &self,
        snapshot: &SettingsSnapshot,
        now: DateTime<Utc>,
    ) -> BackgroundFetchResult {
        let settings = &snapshot.settings;
        if !settings.has_attempted_notification_permission || !settings.notifications_enabled {
            return BackgroundFetchResult::Failed;
        }
        if let Some(last) = settings.last_push_at {
            if (now - last).num_days() <= NOTIFICATION_INTERVAL_DAYS {
                return BackgroundFetchResult::NoData;
            }
        }

        let since = settings
            .last_push_at
            .unwrap_or(now - chrono::Duration::days(DEFAULT_COUNT_WINDOW_DAYS));
        let around = settings
            .notification_location()
            .map(|place| (place, snapshot.search_radius()));
        let kind = FetchKind::NotificationCount { since, around };

        match self
            .pipeline
            .count_quakes(kind, snapshot, now, &CancelSignal::never())
            .await
        {
            Some(count) if count > 1 => {
                self.record("notification time", move |s| s.last_push_at = Some(now))
                    .await;
                self.notifier
                    .notify(&format!("{count} quakes happened last week"))
                    .await;
                BackgroundFetchResult::NewData
            }
            count => {
                tracing::info!(?count, "no notification posted");
                BackgroundFetchResult::Failed
            }
        }
    }
}
