use crate::error::FeedError;
use crate::types::{CountResponse, GeocoderPlace};

/// Extracts the upper-cased ISO country code of the first geocoder match.
///
/// An empty result list is a valid answer (`Ok(None)`), not a failure.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not a JSON array of places.
pub fn parse_country_code(body: &[u8]) -> Result<Option<String>, FeedError> {
    let places: Vec<GeocoderPlace> =
        serde_json::from_slice(body).map_err(|source| FeedError::Deserialize {
            context: "geocoder search".to_owned(),
            source,
        })?;

    Ok(places
        .into_iter()
        .next()
        .and_then(|place| place.address)
        .and_then(|address| address.country_code)
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty()))
}

/// Parses a USGS `count?format=geojson` response.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] for non-JSON bodies and
/// [`FeedError::MissingField`] when `count` is absent.
pub fn parse_count(body: &[u8]) -> Result<u64, FeedError> {
    let response: CountResponse =
        serde_json::from_slice(body).map_err(|source| FeedError::Deserialize {
            context: "usgs count".to_owned(),
            source,
        })?;
    response.count.ok_or_else(|| FeedError::MissingField {
        context: "usgs count".to_owned(),
        field: "count",
    })
}
