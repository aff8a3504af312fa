//! Push-token registration with the notification backend.

use quakes_core::Coordinate;
use reqwest::Url;
use serde_json::json;

use crate::cancel::CancelSignal;
use crate::client::{FeedClient, OperationResult, Request};
use crate::error::FeedError;

const COORDINATE_DIGITS: usize = 7;

/// Builds the registration POST: `{"token", "lat", "long"}` with
/// coordinates rendered to at most seven significant digits.
///
/// # Errors
///
/// Returns [`FeedError::InvalidUrl`] if `endpoint` is not an absolute URL.
pub fn registration_request(
    endpoint: &str,
    token: &str,
    location: Coordinate,
) -> Result<Request, FeedError> {
    let url = Url::parse(endpoint).map_err(|e| FeedError::InvalidUrl {
        url: endpoint.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(Request::PostJson {
        url,
        body: json!({
            "token": token,
            "lat": format_significant(location.latitude, COORDINATE_DIGITS),
            "long": format_significant(location.longitude, COORDINATE_DIGITS),
        }),
    })
}

/// Registers `token` for the given location. The response body is ignored.
pub async fn register_device(
    client: &FeedClient,
    endpoint: &str,
    token: &str,
    location: Coordinate,
    cancel: &CancelSignal,
) -> OperationResult<()> {
    let request = match registration_request(endpoint, token, location) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(endpoint, error = %err, "device registration not sent");
            return OperationResult::NoResult(err);
        }
    };
    client.perform(&request, cancel, |_| Ok(())).await
}

/// Formats `value` with at most `digits` significant digits and no trailing
/// zeros (`37.774929` -> `"37.77493"`, `35.0` -> `"35"`).
#[must_use]
pub fn format_significant(value: f64, digits: usize) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_owned();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let magnitude = value.abs().log10().floor() as i64;
    #[allow(clippy::cast_possible_wrap)]
    let wanted = digits as i64 - 1 - magnitude;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let decimals = wanted.max(0) as usize;

    let formatted = format!("{value:.decimals$}");
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };
    if trimmed == "-0" {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significant_digits_are_capped_at_seven() {
        assert_eq!(format_significant(37.774_929, 7), "37.77493");
        assert_eq!(format_significant(-122.419_416, 7), "-122.4194");
        assert_eq!(format_significant(1.234_567_89, 7), "1.234568");
        assert_eq!(format_significant(0.000_123_456_789, 7), "0.0001234568");
    }

    #[test]
    fn trailing_zeros_are_dropped() {
        assert_eq!(format_significant(35.0, 7), "35");
        assert_eq!(format_significant(-12.5, 7), "-12.5");
        assert_eq!(format_significant(9.999_999_9, 7), "10");
        assert_eq!(format_significant(0.0, 7), "0");
    }

    #[test]
    fn registration_body_shape() {
        let request = registration_request(
            "http://quakes.api.ackermann.io/add_user",
            "abc123",
            Coordinate::new(37.774_929, -122.419_416),
        )
        .unwrap();
        let Request::PostJson { url, body } = request else {
            panic!("expected a POST");
        };
        assert_eq!(url.as_str(), "http://quakes.api.ackermann.io/add_user");
        assert_eq!(
            body,
            json!({ "token": "abc123", "lat": "37.77493", "long": "-122.4194" })
        );
    }
}
