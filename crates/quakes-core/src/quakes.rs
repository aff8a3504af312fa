//! Provider-agnostic earthquake records produced by the feed parsers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// An upstream earthquake feed. Each provider has its own identifier namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Usgs,
    Emsc,
}

impl Provider {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Provider::Usgs => "usgs",
            Provider::Emsc => "emsc",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usgs" => Ok(Provider::Usgs),
            "emsc" => Ok(Provider::Emsc),
            other => Err(CoreError::InvalidValue {
                kind: "provider",
                value: other.to_owned(),
            }),
        }
    }
}

/// A point on the Earth's surface in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle (haversine) distance to `other`, in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// One earthquake as decoded from a provider payload, before it has been
/// reconciled against the store.
///
/// `magnitude`, `latitude`, `longitude` and `occurred_at` are always present;
/// parsers drop a feature rather than produce a record without them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuake {
    pub provider: Provider,
    /// Provider-scoped unique key (e.g. `us7000abcd`, `20240101_0000123`).
    pub identifier: String,
    pub name: String,
    pub magnitude: f64,
    /// Hypocenter depth in meters.
    pub depth_m: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at: DateTime<Utc>,
    /// Provider revision time, when the feed reports one.
    pub revised_at: Option<DateTime<Utc>>,
    /// Extended-record URL (USGS only).
    pub detail_url: Option<String>,
    pub weblink: Option<String>,
    /// Number of "felt" reports; `0.0` when the provider reports none.
    pub felt: f64,
    /// Distance in meters from the reference location of a location fetch.
    pub distance_m: Option<f64>,
}

impl ParsedQuake {
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A city near an event, as reported by the provider's detail product.
///
/// Lists of cities are ordered by proximity rank and that order is kept
/// wherever the list is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNearbyCity {
    pub city_name: String,
    /// Distance from the epicenter in meters.
    pub distance_m: f64,
    /// Compass bearing from the city to the event (e.g. `"SSW"`).
    pub direction: String,
}

/// Extracts the place portion of a provider event name.
///
/// `"10 km SSW of Ridgecrest, CA"` becomes `"CA"`; names without a
/// `" of "` or `", "` separator are returned trimmed.
#[must_use]
pub fn place_name(name: &str) -> &str {
    let after_of = name.rsplit(" of ").next().unwrap_or(name);
    after_of.rsplit(", ").next().unwrap_or(after_of).trim()
}
