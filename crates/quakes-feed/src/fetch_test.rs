use chrono::TimeZone;
use quakes_core::{FetchSize, Settings, SettingsSnapshot};

use super::*;

fn endpoints() -> Endpoints {
    Endpoints::new(
        "https://earthquake.usgs.gov/fdsnws/event/1",
        "https://www.seismicportal.eu/fdsnws/event/1/",
        "https://nominatim.openstreetmap.org",
    )
    .unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 8, 30, 0).unwrap()
}

fn ctx(limit: u32) -> FetchContext {
    FetchContext { limit, now: now() }
}

fn url_of(kind: &FetchKind, provider: Provider, input: Option<&FetchOutput>) -> String {
    match kind.request(provider, &endpoints(), &ctx(225), input).unwrap() {
        Some(Request::Get(url)) => url.to_string(),
        other => panic!("expected GET, got {other:?}"),
    }
}

#[test]
fn usgs_world_query() {
    assert_eq!(
        url_of(&FetchKind::World, Provider::Usgs, None),
        "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson&minmagnitude=2.5&limit=225"
    );
}

#[test]
fn emsc_world_query() {
    assert_eq!(
        url_of(&FetchKind::World, Provider::Emsc, None),
        "https://www.seismicportal.eu/fdsnws/event/1/query?format=json&limit=225&minmag=2.5"
    );
}

#[test]
fn major_query_carries_month_window() {
    assert_eq!(
        url_of(&FetchKind::Major { page: 1 }, Provider::Usgs, None),
        "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson&minmagnitude=3.8&limit=225&endtime=2024-04-15&starttime=2024-03-15"
    );
}

#[test]
fn major_is_usgs_only() {
    let err = FetchKind::Major { page: 0 }
        .request(Provider::Emsc, &endpoints(), &ctx(100), None)
        .unwrap_err();
    assert!(matches!(err, FeedError::UnsupportedFetch { kind: "major", .. }));
}

#[test]
fn location_queries_per_dialect() {
    let kind = FetchKind::Location {
        center: Coordinate::new(35.5, -117.25),
        radius: SearchRadius::Large,
    };
    assert_eq!(
        url_of(&kind, Provider::Usgs, None),
        "https://earthquake.usgs.gov/fdsnws/event/1/query?format=geojson&minmagnitude=1.0&limit=225&latitude=35.5&longitude=-117.25&maxradiuskm=275"
    );
    assert_eq!(
        url_of(&kind, Provider::Emsc, None),
        "https://www.seismicportal.eu/fdsnws/event/1/query?format=json&limit=225&minmag=1.0&lat=35.5&lon=-117.25&maxradius=2.4731"
    );
}

#[test]
fn low_power_snapshot_shrinks_limit_and_radius() {
    let settings = Settings {
        fetch_size: FetchSize::ExtraLarge,
        search_radius: SearchRadius::ExtraLarge,
        ..Settings::default()
    };
    let snapshot = SettingsSnapshot::new(settings, true);
    let ctx = FetchContext::new(&snapshot, now());
    assert_eq!(ctx.limit, 100);
    let kind = FetchKind::location(Coordinate::new(1.0, 2.0), &snapshot);
    assert_eq!(
        kind,
        FetchKind::Location {
            center: Coordinate::new(1.0, 2.0),
            radius: SearchRadius::Small,
        }
    );
}

#[test]
fn nearby_cities_without_input_is_skipped() {
    let kind = FetchKind::NearbyCities;
    let none = kind
        .request(Provider::Usgs, &endpoints(), &ctx(100), None)
        .unwrap();
    assert!(none.is_none());

    let detail_without_url = FetchOutput::Detail(QuakeDetail {
        nearby_cities_url: None,
    });
    let none = kind
        .request(Provider::Usgs, &endpoints(), &ctx(100), Some(&detail_without_url))
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn nearby_cities_uses_detail_output() {
    let detail = FetchOutput::Detail(QuakeDetail {
        nearby_cities_url: Some("https://earthquake.usgs.gov/product/nearby-cities/ci1/nearby-cities.json".into()),
    });
    assert_eq!(
        url_of(&FetchKind::NearbyCities, Provider::Usgs, Some(&detail)),
        "https://earthquake.usgs.gov/product/nearby-cities/ci1/nearby-cities.json"
    );
}

#[test]
fn detail_rejects_non_http_urls() {
    let kind = FetchKind::Detail {
        url: "file:///etc/passwd".into(),
    };
    assert!(matches!(
        kind.request(Provider::Usgs, &endpoints(), &ctx(100), None),
        Err(FeedError::InvalidUrl { .. })
    ));
}

#[test]
fn country_code_query_encodes_place() {
    let kind = FetchKind::CountryCode {
        place: "Ridgecrest, CA".into(),
    };
    assert_eq!(
        url_of(&kind, Provider::Usgs, None),
        "https://nominatim.openstreetmap.org/search?q=Ridgecrest%2C+CA&format=json&addressdetails=1&limit=1"
    );
}

#[test]
fn notification_count_query() {
    let kind = FetchKind::NotificationCount {
        since: Utc.with_ymd_and_hms(2024, 5, 8, 8, 30, 0).unwrap(),
        around: Some((Coordinate::new(35.5, -117.25), SearchRadius::Small)),
    };
    assert_eq!(
        url_of(&kind, Provider::Usgs, None),
        "https://earthquake.usgs.gov/fdsnws/event/1/count?format=geojson&starttime=2024-05-08T08%3A30%3A00&minmagnitude=3.8&latitude=35.5&longitude=-117.25&maxradiuskm=50"
    );
}

#[test]
fn retention_by_kind() {
    let now = now();
    assert_eq!(FetchKind::World.retention(now), Some(Duration::days(30)));
    assert_eq!(FetchKind::Major { page: 3 }.retention(now), Some(Duration::days(365)));
    assert_eq!(FetchKind::NearbyCities.retention(now), None);
}

#[test]
fn deep_major_pages_keep_their_own_window() {
    let now = now();
    // Page 12 starts 2023-04-15, 396 days back.
    assert_eq!(FetchKind::Major { page: 12 }.retention(now), Some(Duration::days(396)));
    let deep = FetchKind::Major { page: 40 }.retention(now).unwrap();
    let window = major_window(now, 40).unwrap();
    assert!(now - deep <= window.start);
}

#[test]
fn location_decode_fills_distance() {
    let body = serde_json::json!({
        "features": [{
            "id": "ci1",
            "properties": { "mag": 2.0, "place": "Somewhere", "time": 1_700_000_000_000_i64 },
            "geometry": { "coordinates": [-117.25, 35.5, 5.0] }
        }]
    });
    let kind = FetchKind::Location {
        center: Coordinate::new(35.5, -117.25),
        radius: SearchRadius::Small,
    };
    let FetchOutput::Quakes(quakes) = kind
        .decode(Provider::Usgs, &serde_json::to_vec(&body).unwrap())
        .unwrap()
    else {
        panic!("expected quakes");
    };
    assert!(quakes[0].distance_m.unwrap().abs() < 1e-6);
}
