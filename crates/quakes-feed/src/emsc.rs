//! EMSC (seismicportal.eu) event parser.

use chrono::{DateTime, NaiveDateTime, Utc};
use quakes_core::{ParsedQuake, Provider};

use crate::error::FeedError;
use crate::parse_helpers::{
    feature_collection, non_empty, title_case, valid_latitude, valid_longitude,
};
use crate::types::EmscFeature;

const CONTEXT: &str = "emsc events";
const EVENT_PAGE: &str = "https://www.seismicportal.eu/eventdetails.html?unid=";

/// Parses an EMSC `query?format=json` response body.
///
/// Same partial-failure contract as the USGS parser: features missing an
/// identifier, magnitude, time or valid position are skipped.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not JSON, or
/// [`FeedError::MissingField`] if it has no `features` array.
pub fn parse_emsc_quakes(body: &[u8]) -> Result<Vec<ParsedQuake>, FeedError> {
    let features = feature_collection(body, CONTEXT)?;
    let total = features.len();
    let quakes: Vec<ParsedQuake> = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let parsed = serde_json::from_value::<EmscFeature>(raw)
                .ok()
                .and_then(normalize_feature);
            if parsed.is_none() {
                tracing::debug!(index, "skipping malformed emsc feature");
            }
            parsed
        })
        .collect();

    if quakes.len() < total {
        tracing::warn!(
            total,
            kept = quakes.len(),
            "some emsc features were skipped"
        );
    }
    Ok(quakes)
}

fn normalize_feature(feature: EmscFeature) -> Option<ParsedQuake> {
    let props = feature.properties;
    let identifier = non_empty(props.unid).or_else(|| non_empty(feature.id))?;

    let magnitude = props.mag.filter(|m| m.is_finite())?;
    let occurred_at = props.time.as_deref().and_then(parse_timestamp)?;

    // Properties carry the position; geometry is the fallback.
    let coords = feature.geometry.map(|g| g.coordinates).unwrap_or_default();
    let latitude = props
        .lat
        .or_else(|| coords.get(1).copied().flatten())
        .filter(|v| valid_latitude(*v))?;
    let longitude = props
        .lon
        .or_else(|| coords.first().copied().flatten())
        .filter(|v| valid_longitude(*v))?;
    let depth_km = props
        .depth
        .or_else(|| coords.get(2).copied().flatten().map(f64::abs))
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    let name = non_empty(props.flynn_region)
        .map_or_else(|| "Unknown region".to_owned(), |region| title_case(&region));
    let weblink = format!("{EVENT_PAGE}{identifier}");

    Some(ParsedQuake {
        provider: Provider::Emsc,
        name,
        magnitude,
        depth_m: depth_km * 1000.0,
        latitude,
        longitude,
        occurred_at,
        revised_at: props.lastupdate.as_deref().and_then(parse_timestamp),
        detail_url: None,
        weblink: Some(weblink),
        felt: 0.0,
        distance_m: None,
        identifier,
    })
}

/// Accepts RFC 3339 and the zone-less `2024-01-01T12:00:00.5` form, which
/// EMSC reports in UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}
