//! USGS GeoJSON event parser.
//!
//! Output order follows the `features` array. A feature missing its id,
//! magnitude, time or a valid longitude/latitude pair is skipped; the rest
//! of the batch is kept.

use chrono::DateTime;
use quakes_core::{ParsedQuake, Provider};

use crate::error::FeedError;
use crate::parse_helpers::{feature_collection, non_empty, valid_latitude, valid_longitude};
use crate::types::UsgsFeature;

const CONTEXT: &str = "usgs events";
const UNKNOWN_PLACE: &str = "Unknown location";

/// Parses a USGS `query?format=geojson` response body.
///
/// # Errors
///
/// Returns [`FeedError::Deserialize`] if the body is not JSON, or
/// [`FeedError::MissingField`] if it has no `features` array.
pub fn parse_usgs_quakes(body: &[u8]) -> Result<Vec<ParsedQuake>, FeedError> {
    let features = feature_collection(body, CONTEXT)?;
    let total = features.len();
    let quakes: Vec<ParsedQuake> = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match serde_json::from_value::<UsgsFeature>(raw) {
            Ok(feature) => {
                let parsed = normalize_feature(feature);
                if parsed.is_none() {
                    tracing::debug!(index, "skipping usgs feature with missing required fields");
                }
                parsed
            }
            Err(e) => {
                tracing::debug!(index, error = %e, "skipping malformed usgs feature");
                None
            }
        })
        .collect();

    if quakes.len() < total {
        tracing::warn!(
            total,
            kept = quakes.len(),
            "some usgs features were skipped"
        );
    }
    Ok(quakes)
}

fn normalize_feature(feature: UsgsFeature) -> Option<ParsedQuake> {
    let identifier = non_empty(Some(feature.id))?;
    let props = feature.properties;

    let magnitude = props.mag.filter(|m| m.is_finite())?;
    let occurred_at = props.time.and_then(DateTime::from_timestamp_millis)?;

    let coords = feature.geometry?.coordinates;
    let longitude = coords.first().copied().flatten().filter(|v| valid_longitude(*v))?;
    let latitude = coords.get(1).copied().flatten().filter(|v| valid_latitude(*v))?;
    let depth_km = coords
        .get(2)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0);

    let name = non_empty(props.place)
        .or_else(|| non_empty(props.title))
        .unwrap_or_else(|| UNKNOWN_PLACE.to_owned());

    Some(ParsedQuake {
        provider: Provider::Usgs,
        identifier,
        name,
        magnitude,
        depth_m: depth_km * 1000.0,
        latitude,
        longitude,
        occurred_at,
        revised_at: props.updated.and_then(DateTime::from_timestamp_millis),
        detail_url: non_empty(props.detail),
        weblink: non_empty(props.url),
        felt: props.felt.filter(|f| f.is_finite()).unwrap_or(0.0),
        distance_m: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(id: &str, mag: serde_json::Value, coords: serde_json::Value) -> serde_json::Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": {
                "mag": mag,
                "place": "10 km SSW of Ridgecrest, CA",
                "time": 1_700_000_000_000_i64,
                "updated": 1_700_000_600_000_i64,
                "url": format!("https://earthquake.usgs.gov/earthquakes/eventpage/{id}"),
                "detail": format!("https://earthquake.usgs.gov/fdsnws/event/1/query?eventid={id}&format=geojson"),
                "felt": 12
            },
            "geometry": { "type": "Point", "coordinates": coords }
        })
    }

    fn body(features: &[serde_json::Value]) -> Vec<u8> {
        serde_json::to_vec(&json!({ "type": "FeatureCollection", "features": features })).unwrap()
    }

    #[test]
    fn parses_full_feature() {
        let quakes = parse_usgs_quakes(&body(&[feature(
            "ci40000001",
            json!(4.2),
            json!([-117.6, 35.7, 8.5]),
        )]))
        .unwrap();

        assert_eq!(quakes.len(), 1);
        let q = &quakes[0];
        assert_eq!(q.provider, Provider::Usgs);
        assert_eq!(q.identifier, "ci40000001");
        assert_eq!(q.name, "10 km SSW of Ridgecrest, CA");
        assert!((q.magnitude - 4.2).abs() < f64::EPSILON);
        assert!((q.depth_m - 8500.0).abs() < 1e-9);
        assert!((q.latitude - 35.7).abs() < f64::EPSILON);
        assert!((q.longitude + 117.6).abs() < f64::EPSILON);
        assert_eq!(q.occurred_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(
            q.revised_at.map(|t| t.timestamp_millis()),
            Some(1_700_000_600_000)
        );
        assert!(q.detail_url.as_deref().unwrap().contains("eventid=ci40000001"));
        assert!((q.felt - 12.0).abs() < f64::EPSILON);
        assert!(q.distance_m.is_none());
    }

    #[test]
    fn skips_bad_features_and_keeps_order() {
        let mut no_time = feature("nc3", json!(3.0), json!([-122.0, 37.0, 1.0]));
        no_time["properties"]["time"] = serde_json::Value::Null;

        let quakes = parse_usgs_quakes(&body(&[
            feature("nc1", json!(2.6), json!([-122.0, 37.0, 1.0])),
            feature("nc2", serde_json::Value::Null, json!([-122.0, 37.0, 1.0])),
            no_time,
            feature("nc4", json!(3.1), json!([-122.0])),
            feature("nc5", json!(3.1), json!([-122.0, 137.0])),
            json!({ "id": "nc6" }),
            feature("nc7", json!(5.0), json!([140.1, 36.2, 40.0])),
        ]))
        .unwrap();

        let ids: Vec<&str> = quakes.iter().map(|q| q.identifier.as_str()).collect();
        assert_eq!(ids, ["nc1", "nc7"]);
    }

    #[test]
    fn missing_depth_and_felt_default_to_zero() {
        let mut f = feature("us1", json!(5.5), json!([10.0, 20.0]));
        f["properties"]["felt"] = serde_json::Value::Null;
        let quakes = parse_usgs_quakes(&body(&[f])).unwrap();
        assert!(quakes[0].depth_m.abs() < f64::EPSILON);
        assert!(quakes[0].felt.abs() < f64::EPSILON);
    }

    #[test]
    fn falls_back_to_title_when_place_missing() {
        let mut f = feature("us2", json!(5.5), json!([10.0, 20.0]));
        f["properties"]["place"] = serde_json::Value::Null;
        f["properties"]["title"] = json!("M 5.5 - Central Mid-Atlantic Ridge");
        let quakes = parse_usgs_quakes(&body(&[f])).unwrap();
        assert_eq!(quakes[0].name, "M 5.5 - Central Mid-Atlantic Ridge");
    }

    #[test]
    fn parsing_is_deterministic() {
        let payload = body(&[
            feature("a", json!(2.5), json!([1.0, 2.0, 3.0])),
            feature("b", json!(3.5), json!([4.0, 5.0, 6.0])),
        ]);
        assert_eq!(
            parse_usgs_quakes(&payload).unwrap(),
            parse_usgs_quakes(&payload).unwrap()
        );
    }

    #[test]
    fn empty_collection_is_valid() {
        assert!(parse_usgs_quakes(&body(&[])).unwrap().is_empty());
    }

    #[test]
    fn missing_features_is_an_error() {
        assert!(parse_usgs_quakes(br#"{"type":"FeatureCollection"}"#).is_err());
    }
}
