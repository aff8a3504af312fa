//! Host collaborators for the background coordinator.

use std::time::Duration;

use quakes_pipeline::{Notifier, Reachability};

const PROBE_TIMEOUT_SECS: u64 = 5;

/// Treats any HTTP response from the probe URL as "online".
pub(crate) struct HttpReachability {
    client: reqwest::Client,
    probe_url: String,
}

impl HttpReachability {
    pub(crate) fn new(probe_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            probe_url: probe_url.to_owned(),
        })
    }
}

impl Reachability for HttpReachability {
    async fn is_reachable(&self) -> bool {
        match self.client.head(&self.probe_url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.probe_url, error = %e, "reachability probe failed");
                false
            }
        }
    }
}

/// Writes notifications to stdout and the log.
pub(crate) struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, message: &str) {
        tracing::info!(message, "local notification");
        println!("notification: {message}");
    }
}
