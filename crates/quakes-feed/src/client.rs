//! The network operation: one HTTP request with retry, cancellation,
//! activity tracking and a caller-supplied decode step.
//!
//! Failures never propagate as `Err` out of [`FeedClient::perform`]; they
//! resolve to [`OperationResult::NoResult`] carrying the cause, which is
//! distinct from a successfully decoded empty value.

use std::time::Duration;

use quakes_core::AppConfig;
use reqwest::{Client, Url};

use crate::activity::NetworkActivity;
use crate::cancel::CancelSignal;
use crate::error::FeedError;
use crate::retry::retry_with_backoff;

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get(Url),
    PostJson { url: Url, body: serde_json::Value },
}

impl Request {
    #[must_use]
    pub fn url(&self) -> &Url {
        match self {
            Request::Get(url) | Request::PostJson { url, .. } => url,
        }
    }
}

/// How a network operation resolved.
#[derive(Debug)]
pub enum OperationResult<T> {
    /// The body arrived and the decode step succeeded (possibly with an
    /// empty value).
    Decoded(T),
    /// Transport, status or decode failure. Already logged.
    NoResult(FeedError),
    /// Cancelled before a result could be used. The decode step never ran.
    Cancelled,
}

impl<T> OperationResult<T> {
    #[must_use]
    pub fn decoded(self) -> Option<T> {
        match self {
            OperationResult::Decoded(value) => Some(value),
            OperationResult::NoResult(_) | OperationResult::Cancelled => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationResult::Cancelled)
    }
}

/// HTTP client shared by every fetch.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    activity: NetworkActivity,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl FeedClient {
    /// Builds a client with a per-request timeout and user agent.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
        activity: NetworkActivity,
    ) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            activity,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Builds a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn from_config(config: &AppConfig, activity: NetworkActivity) -> Result<Self, FeedError> {
        Self::new(
            config.request_timeout_secs,
            &config.user_agent,
            config.max_retries,
            config.retry_backoff_base_ms,
            activity,
        )
    }

    #[must_use]
    pub fn activity(&self) -> &NetworkActivity {
        &self.activity
    }

    /// Sends `request` and hands the body to `decode`.
    ///
    /// The activity slot is held from just before the first send until the
    /// body has been received or the operation is cancelled. A cancellation
    /// observed at any point before decoding discards the response.
    pub async fn perform<T, D>(
        &self,
        request: &Request,
        cancel: &CancelSignal,
        decode: D,
    ) -> OperationResult<T>
    where
        D: FnOnce(&[u8]) -> Result<T, FeedError>,
    {
        let url = request.url().as_str();
        if cancel.is_cancelled() {
            tracing::debug!(url, "operation cancelled before start");
            return OperationResult::Cancelled;
        }

        let guard = self.activity.acquire();
        tracing::debug!(url, "request started");
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FeedError::Cancelled),
            result = self.fetch_body(request) => result,
        };
        drop(guard);

        let body = match received {
            Ok(body) => body,
            Err(FeedError::Cancelled) => {
                tracing::debug!(url, "operation cancelled in flight");
                return OperationResult::Cancelled;
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "request failed");
                return OperationResult::NoResult(err);
            }
        };

        if cancel.is_cancelled() {
            tracing::debug!(url, "operation cancelled; discarding response");
            return OperationResult::Cancelled;
        }

        match decode(&body) {
            Ok(value) => {
                tracing::debug!(url, bytes = body.len(), "request decoded");
                OperationResult::Decoded(value)
            }
            Err(err) => {
                tracing::warn!(url, error = %err, "response could not be decoded");
                OperationResult::NoResult(err)
            }
        }
    }

    /// Sends the request with retry and returns the raw body of a 2xx response.
    async fn fetch_body(&self, request: &Request) -> Result<Vec<u8>, FeedError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let builder = match request {
                Request::Get(url) => self.client.get(url.clone()),
                Request::PostJson { url, body } => self.client.post(url.clone()).json(body),
            };
            let response = builder.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FeedError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: request.url().to_string(),
                });
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }
}

/// Parses a configured base URL, normalising it to end with exactly one
/// slash so relative joins append to the path instead of replacing its last
/// segment.
///
/// # Errors
///
/// Returns [`FeedError::InvalidUrl`] if `raw` is not an absolute URL.
pub fn parse_base_url(raw: &str) -> Result<Url, FeedError> {
    let normalised = format!("{}/", raw.trim_end_matches('/'));
    Url::parse(&normalised).map_err(|e| FeedError::InvalidUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_base_url_adds_single_trailing_slash() {
        let url = parse_base_url("https://earthquake.usgs.gov/fdsnws/event/1").unwrap();
        assert_eq!(url.as_str(), "https://earthquake.usgs.gov/fdsnws/event/1/");
        let url = parse_base_url("https://earthquake.usgs.gov/fdsnws/event/1//").unwrap();
        assert_eq!(url.as_str(), "https://earthquake.usgs.gov/fdsnws/event/1/");
    }

    #[test]
    fn parse_base_url_rejects_relative() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(FeedError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn decoded_extracts_value_only_on_success() {
        assert_eq!(OperationResult::Decoded(3).decoded(), Some(3));
        assert_eq!(OperationResult::<u8>::Cancelled.decoded(), None);
        assert!(OperationResult::<u8>::Cancelled.is_cancelled());
    }
}
