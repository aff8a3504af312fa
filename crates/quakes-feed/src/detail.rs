//! USGS detail documents and the nearby-cities product they link to.

use quakes_core::ParsedNearbyCity;

use crate::error::FeedError;
use crate::parse_helpers::non_empty;
use crate::types::NearbyCityEntry;

const NEARBY_CITIES_POINTER: &str =
    "/properties/products/nearby-cities/0/contents/nearby-cities.json/url";

/// The parts of a detail document the enrichment chain consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeDetail {
    /// Absent when the event has no nearby-cities product yet.
    pub nearby_cities_url: Option<String>,
}

/// Parses a USGS `query?eventid=…&format=geojson` detail document.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not JSON, or
/// [`FeedError::MissingField`] if it has no `properties` object.
pub fn parse_detail(body: &[u8]) -> Result<QuakeDetail, FeedError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|source| FeedError::Deserialize {
            context: "usgs detail".to_owned(),
            source,
        })?;

    if !value.get("properties").is_some_and(serde_json::Value::is_object) {
        return Err(FeedError::MissingField {
            context: "usgs detail".to_owned(),
            field: "properties",
        });
    }

    let nearby_cities_url = value
        .pointer(NEARBY_CITIES_POINTER)
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    Ok(QuakeDetail {
        nearby_cities_url: non_empty(nearby_cities_url),
    })
}

/// Parses a `nearby-cities.json` array, keeping the provider's order.
/// Entries without a name or distance are skipped.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not a JSON array.
pub fn parse_nearby_cities(body: &[u8]) -> Result<Vec<ParsedNearbyCity>, FeedError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|source| FeedError::Deserialize {
            context: "nearby cities".to_owned(),
            source,
        })?;

    Ok(entries
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<NearbyCityEntry>(raw).ok())
        .filter_map(|entry| {
            let city_name = non_empty(entry.name)?;
            let distance_km = entry.distance.filter(|d| d.is_finite())?;
            Some(ParsedNearbyCity {
                city_name,
                distance_m: distance_km * 1000.0,
                direction: entry.direction.unwrap_or_default().trim().to_owned(),
            })
        })
        .collect())
}
