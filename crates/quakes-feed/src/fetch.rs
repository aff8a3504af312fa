//! Fetch kinds: per-variant URL construction and decode strategy.
//!
//! A [`FetchKind`] plus a [`Provider`] fully determines the request, given
//! the [`Endpoints`], a [`FetchContext`] frozen at invocation time and, for
//! dependent kinds, the upstream node's decoded output.

use chrono::{DateTime, Duration, Utc};
use quakes_core::{
    AppConfig, Coordinate, ParsedNearbyCity, ParsedQuake, Provider, SearchRadius,
    SettingsSnapshot,
};
use reqwest::Url;

use crate::client::{parse_base_url, Request};
use crate::detail::{parse_detail, parse_nearby_cities, QuakeDetail};
use crate::emsc::parse_emsc_quakes;
use crate::error::FeedError;
use crate::geocode::{parse_count, parse_country_code};
use crate::usgs::parse_usgs_quakes;
use crate::window::major_window;

pub const WORLD_MIN_MAGNITUDE: f64 = 2.5;
pub const MAJOR_MIN_MAGNITUDE: f64 = 3.8;
pub const LOCATION_MIN_MAGNITUDE: f64 = 1.0;
pub const NOTIFICATION_MIN_MAGNITUDE: f64 = 3.8;

/// Kilometers per degree of arc, for providers that take a radius in degrees.
const KM_PER_DEGREE: f64 = 111.195;

const SHORT_RETENTION_DAYS: i64 = 30;
const MAJOR_RETENTION_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchKind {
    World,
    Major {
        page: u32,
    },
    Location {
        center: Coordinate,
        radius: SearchRadius,
    },
    Detail {
        url: String,
    },
    /// Consumes the nearby-cities URL from an upstream [`FetchKind::Detail`].
    NearbyCities,
    CountryCode {
        place: String,
    },
    NotificationCount {
        since: DateTime<Utc>,
        around: Option<(Coordinate, SearchRadius)>,
    },
}

impl FetchKind {
    /// Location fetch using the snapshot's effective radius.
    #[must_use]
    pub fn location(center: Coordinate, snapshot: &SettingsSnapshot) -> Self {
        FetchKind::Location {
            center,
            radius: snapshot.search_radius(),
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            FetchKind::World => "world",
            FetchKind::Major { .. } => "major",
            FetchKind::Location { .. } => "location",
            FetchKind::Detail { .. } => "detail",
            FetchKind::NearbyCities => "nearby-cities",
            FetchKind::CountryCode { .. } => "country-code",
            FetchKind::NotificationCount { .. } => "notification-count",
        }
    }

    /// Whether `provider` offers this kind. World and location queries go to
    /// every provider; the rest exist only in the USGS dialect (country
    /// lookups go to the geocoder and ignore the provider).
    #[must_use]
    pub const fn supports(&self, provider: Provider) -> bool {
        match self {
            FetchKind::World | FetchKind::Location { .. } | FetchKind::CountryCode { .. } => true,
            FetchKind::Major { .. }
            | FetchKind::Detail { .. }
            | FetchKind::NearbyCities
            | FetchKind::NotificationCount { .. } => matches!(provider, Provider::Usgs),
        }
    }

    /// How long quakes fetched by this kind are kept, or `None` for kinds
    /// that do not produce quake lists.
    ///
    /// A major page always reaches back at least as far as its own window
    /// start, so deep pages are not pruned in the same call that stores them.
    #[must_use]
    pub fn retention(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            FetchKind::World | FetchKind::Location { .. } => {
                Some(Duration::days(SHORT_RETENTION_DAYS))
            }
            FetchKind::Major { page } => {
                let floor = Duration::days(MAJOR_RETENTION_DAYS);
                let reach = major_window(now, *page).map_or(floor, |window| now - window.start);
                Some(reach.max(floor))
            }
            FetchKind::Detail { .. }
            | FetchKind::NearbyCities
            | FetchKind::CountryCode { .. }
            | FetchKind::NotificationCount { .. } => None,
        }
    }

    /// Builds the request for this kind.
    ///
    /// Returns `Ok(None)` when a dependent kind received no usable input, in
    /// which case the node must be skipped rather than run.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnsupportedFetch`] if `provider` does not offer
    /// this kind, or [`FeedError::InvalidUrl`] if a provider-supplied URL
    /// cannot be parsed.
    pub fn request(
        &self,
        provider: Provider,
        endpoints: &Endpoints,
        ctx: &FetchContext,
        input: Option<&FetchOutput>,
    ) -> Result<Option<Request>, FeedError> {
        if !self.supports(provider) {
            return Err(FeedError::UnsupportedFetch {
                kind: self.label(),
                provider,
            });
        }

        let url = match self {
            FetchKind::World => quake_query(provider, endpoints, ctx, WORLD_MIN_MAGNITUDE),
            FetchKind::Major { page } => {
                let mut url = quake_query(provider, endpoints, ctx, MAJOR_MIN_MAGNITUDE);
                if let Some(window) = major_window(ctx.now, *page) {
                    url.query_pairs_mut()
                        .append_pair("endtime", &window.end.format("%Y-%m-%d").to_string())
                        .append_pair("starttime", &window.start.format("%Y-%m-%d").to_string());
                } else {
                    tracing::warn!(page, "major window out of range; querying without dates");
                }
                url
            }
            FetchKind::Location { center, radius } => {
                let mut url = quake_query(provider, endpoints, ctx, LOCATION_MIN_MAGNITUDE);
                append_area(&mut url, provider, *center, *radius);
                url
            }
            FetchKind::Detail { url } => absolute_url(url)?,
            FetchKind::NearbyCities => match input {
                Some(FetchOutput::Detail(QuakeDetail {
                    nearby_cities_url: Some(url),
                    ..
                })) => absolute_url(url)?,
                _ => return Ok(None),
            },
            FetchKind::CountryCode { place } => {
                let mut url = join(&endpoints.geocoder, "search");
                url.query_pairs_mut()
                    .append_pair("q", place)
                    .append_pair("format", "json")
                    .append_pair("addressdetails", "1")
                    .append_pair("limit", "1");
                url
            }
            FetchKind::NotificationCount { since, around } => {
                let mut url = join(&endpoints.usgs, "count");
                url.query_pairs_mut()
                    .append_pair("format", "geojson")
                    .append_pair("starttime", &since.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .append_pair("minmagnitude", &format_magnitude(NOTIFICATION_MIN_MAGNITUDE));
                if let Some((center, radius)) = around {
                    append_area(&mut url, provider, *center, *radius);
                }
                url
            }
        };
        Ok(Some(Request::Get(url)))
    }

    /// Decodes a response body for this kind.
    ///
    /// Location results get their distance from the search center filled in.
    ///
    /// # Errors
    ///
    /// Propagates the parser's decode error.
    pub fn decode(&self, provider: Provider, body: &[u8]) -> Result<FetchOutput, FeedError> {
        match self {
            FetchKind::World | FetchKind::Major { .. } => {
                parse_quakes(provider, body).map(FetchOutput::Quakes)
            }
            FetchKind::Location { center, .. } => {
                let mut quakes = parse_quakes(provider, body)?;
                for quake in &mut quakes {
                    quake.distance_m = Some(center.distance_to(&quake.coordinate()));
                }
                Ok(FetchOutput::Quakes(quakes))
            }
            FetchKind::Detail { .. } => parse_detail(body).map(FetchOutput::Detail),
            FetchKind::NearbyCities => parse_nearby_cities(body).map(FetchOutput::NearbyCities),
            FetchKind::CountryCode { .. } => {
                parse_country_code(body).map(FetchOutput::CountryCode)
            }
            FetchKind::NotificationCount { .. } => parse_count(body).map(FetchOutput::Count),
        }
    }
}

/// Decoded result of one fetch node.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutput {
    Quakes(Vec<ParsedQuake>),
    Detail(QuakeDetail),
    NearbyCities(Vec<ParsedNearbyCity>),
    CountryCode(Option<String>),
    Count(u64),
}

/// Provider base URLs, normalised to end with a slash.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub usgs: Url,
    pub emsc: Url,
    pub geocoder: Url,
}

impl Endpoints {
    /// # Errors
    ///
    /// Returns [`FeedError::InvalidUrl`] if any base URL is not absolute.
    pub fn new(usgs: &str, emsc: &str, geocoder: &str) -> Result<Self, FeedError> {
        Ok(Self {
            usgs: parse_base_url(usgs)?,
            emsc: parse_base_url(emsc)?,
            geocoder: parse_base_url(geocoder)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`FeedError::InvalidUrl`] if any configured base URL is not absolute.
    pub fn from_config(config: &AppConfig) -> Result<Self, FeedError> {
        Self::new(
            &config.usgs_base_url,
            &config.emsc_base_url,
            &config.geocoder_base_url,
        )
    }

    fn events(&self, provider: Provider) -> &Url {
        match provider {
            Provider::Usgs => &self.usgs,
            Provider::Emsc => &self.emsc,
        }
    }
}

/// Request inputs frozen at invocation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchContext {
    pub limit: u32,
    pub now: DateTime<Utc>,
}

impl FetchContext {
    #[must_use]
    pub fn new(snapshot: &SettingsSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            limit: snapshot.fetch_size().limit(),
            now,
        }
    }
}

fn parse_quakes(provider: Provider, body: &[u8]) -> Result<Vec<ParsedQuake>, FeedError> {
    match provider {
        Provider::Usgs => parse_usgs_quakes(body),
        Provider::Emsc => parse_emsc_quakes(body),
    }
}

fn join(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    // Only cannot-be-a-base URLs refuse segments.
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(path);
    }
    url
}

fn quake_query(
    provider: Provider,
    endpoints: &Endpoints,
    ctx: &FetchContext,
    min_mag: f64,
) -> Url {
    let mut url = join(endpoints.events(provider), "query");
    {
        let mut pairs = url.query_pairs_mut();
        match provider {
            Provider::Usgs => {
                pairs
                    .append_pair("format", "geojson")
                    .append_pair("minmagnitude", &format_magnitude(min_mag))
                    .append_pair("limit", &ctx.limit.to_string());
            }
            Provider::Emsc => {
                pairs
                    .append_pair("format", "json")
                    .append_pair("limit", &ctx.limit.to_string())
                    .append_pair("minmag", &format_magnitude(min_mag));
            }
        }
    }
    url
}

fn append_area(url: &mut Url, provider: Provider, center: Coordinate, radius: SearchRadius) {
    let mut pairs = url.query_pairs_mut();
    match provider {
        Provider::Usgs => {
            pairs
                .append_pair("latitude", &center.latitude.to_string())
                .append_pair("longitude", &center.longitude.to_string())
                .append_pair("maxradiuskm", &radius.km().to_string());
        }
        Provider::Emsc => {
            let degrees = f64::from(radius.km()) / KM_PER_DEGREE;
            pairs
                .append_pair("lat", &center.latitude.to_string())
                .append_pair("lon", &center.longitude.to_string())
                .append_pair("maxradius", &format!("{degrees:.4}"));
        }
    }
}

fn format_magnitude(magnitude: f64) -> String {
    format!("{magnitude:.1}")
}

fn absolute_url(raw: &str) -> Result<Url, FeedError> {
    let url = Url::parse(raw.trim()).map_err(|e| FeedError::InvalidUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })?;
    if matches!(url.scheme(), "http" | "https") {
        Ok(url)
    } else {
        Err(FeedError::InvalidUrl {
            url: raw.to_owned(),
            reason: format!("unsupported scheme {}", url.scheme()),
        })
    }
}

#[cfg(test)]
#[path = "fetch_test.rs"]
mod tests;
