//! Raw provider payload shapes.
//!
//! Every field a provider might omit or null is optional here; the parsers
//! decide which gaps drop a feature.

use serde::Deserialize;

/// Top-level envelope shared by both event feeds. Features stay as raw
/// values so one malformed feature cannot fail the whole batch.
#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct PointGeometry {
    #[serde(default)]
    pub coordinates: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct UsgsFeature {
    pub id: String,
    pub properties: UsgsProperties,
    pub geometry: Option<PointGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct UsgsProperties {
    pub mag: Option<f64>,
    pub place: Option<String>,
    pub title: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub time: Option<i64>,
    pub updated: Option<i64>,
    pub url: Option<String>,
    pub detail: Option<String>,
    pub felt: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct EmscFeature {
    pub id: Option<String>,
    pub properties: EmscProperties,
    pub geometry: Option<PointGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct EmscProperties {
    pub unid: Option<String>,
    pub mag: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Kilometers.
    pub depth: Option<f64>,
    pub time: Option<String>,
    pub lastupdate: Option<String>,
    pub flynn_region: Option<String>,
}

/// One entry of the USGS `nearby-cities.json` product.
#[derive(Debug, Deserialize)]
pub struct NearbyCityEntry {
    pub name: Option<String>,
    /// Kilometers.
    pub distance: Option<f64>,
    pub direction: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GeocoderPlace {
    pub address: Option<GeocoderAddress>,
}

#[derive(Debug, Deserialize)]
pub struct GeocoderAddress {
    pub country_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CountResponse {
    pub count: Option<u64>,
}
