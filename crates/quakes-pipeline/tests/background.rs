//! Background fetch activations against wiremock providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use quakes_core::{
    Coordinate, EmptyResultPolicy, LastOption, LowPowerMode, Provider, Settings, SettingsStore,
};
use quakes_db::{connect_memory_pool, run_migrations, QuakeFilter, QuakeStore};
use quakes_feed::{Endpoints, FeedClient, NetworkActivity};
use quakes_pipeline::{BackgroundFetch, BackgroundFetchResult, FetchPipeline, Notifier, Reachability};
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Online(bool);

impl Reachability for Online {
    async fn is_reachable(&self) -> bool {
        self.0
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier(Arc<Mutex<Vec<String>>>);

impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_owned());
    }
}

struct Harness {
    fetch: BackgroundFetch<Online, RecordingNotifier>,
    store: Arc<QuakeStore>,
    settings: Arc<SettingsStore>,
    notes: RecordingNotifier,
    _dir: tempfile::TempDir,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
}

async fn harness(server: &MockServer, online: bool, configure: impl FnOnce(&mut Settings)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let settings = Arc::new(SettingsStore::open(dir.path().join("settings.yaml")).unwrap());
    settings.update(configure).unwrap();

    let pool = connect_memory_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Arc::new(QuakeStore::new(pool));

    let client = FeedClient::new(5, "quakes-test/0.1", 0, 0, NetworkActivity::new()).unwrap();
    let endpoints = Endpoints::new(&server.uri(), &server.uri(), &server.uri()).unwrap();
    let pipeline = FetchPipeline::new(client, endpoints, Arc::clone(&store), 4);
    let notes = RecordingNotifier::default();

    let fetch = BackgroundFetch::new(pipeline, Arc::clone(&settings), Online(online), notes.clone())
        .with_low_power(LowPowerMode::Off);
    Harness {
        fetch,
        store,
        settings,
        notes,
        _dir: dir,
    }
}

fn usgs_feature(id: &str, mag: Option<f64>) -> serde_json::Value {
    serde_json::json!({
        "type": "Feature",
        "id": id,
        "properties": {
            "mag": mag,
            "place": "12 km NE of Ridgecrest, CA",
            "time": 1_715_700_000_000_i64,
            "url": format!("https://earthquake.usgs.gov/earthquakes/eventpage/{id}"),
            "detail": format!("https://earthquake.usgs.gov/fdsnws/event/1/query?eventid={id}&format=geojson"),
        },
        "geometry": { "type": "Point", "coordinates": [-117.5, 35.8, 7.2] }
    })
}

#[tokio::test]
async fn world_option_merges_valid_features() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("minmagnitude", "2.5"))
        .and(query_param("limit", "225"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                usgs_feature("ci1", Some(2.7)),
                usgs_feature("ci2", Some(3.1)),
                usgs_feature("ci3", None),
                usgs_feature("ci4", Some(4.4)),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.providers = vec![Provider::Usgs];
        s.last_option = Some(LastOption::World);
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::NewData);
    assert_eq!(h.store.count_quakes(&QuakeFilter::default()).await.unwrap(), 3);
    assert_eq!(h.settings.current().last_fetch_at, Some(now()));

    let reopened = SettingsStore::open(h.settings.path()).unwrap();
    assert_eq!(reopened.current().last_fetch_at, Some(now()));
}

#[tokio::test]
async fn no_option_without_permission_fails_offline() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.has_attempted_notification_permission = false;
        s.notifications_enabled = true;
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::Failed);
}

#[tokio::test]
async fn unreachable_network_fails_immediately() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, false, |s| s.last_option = Some(LastOption::World)).await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::Failed);
}

#[tokio::test]
async fn nearby_without_cached_place_fails() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| s.last_option = Some(LastOption::Nearby)).await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::Failed);
}

#[tokio::test]
async fn searched_place_survives_one_failing_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("format", "geojson"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .and(query_param("format", "json"))
        .and(query_param("lat", "37.5"))
        .and(query_param("lon", "22"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "id": "20240514_0000101",
                "properties": {
                    "unid": "20240514_0000101",
                    "mag": 3.9,
                    "lat": 37.6,
                    "lon": 22.1,
                    "depth": 10.0,
                    "time": "2024-05-14T08:15:00.0Z",
                    "flynn_region": "SOUTHERN GREECE"
                }
            }]
        })))
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.providers = vec![Provider::Usgs, Provider::Emsc];
        s.last_option = Some(LastOption::World);
        s.last_searched_place = Some(Coordinate::new(37.5, 22.0));
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::NewData);
    let stored = h
        .store
        .get_quake(Provider::Emsc, "20240514_0000101")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Southern Greece");
    let distance = stored.distance_m.unwrap();
    assert!(distance > 10_000.0 && distance < 20_000.0, "distance {distance}");
}

#[tokio::test]
async fn empty_result_follows_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "FeatureCollection",
            "features": []
        })))
        .mount(&server)
        .await;

    let configure = |s: &mut Settings| {
        s.providers = vec![Provider::Usgs];
        s.last_option = Some(LastOption::Major);
    };

    let h = harness(&server, true, configure).await;
    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::NewData);

    let h = harness(&server, true, configure).await;
    let fetch = h.fetch.with_policy(EmptyResultPolicy::NoData);
    assert_eq!(fetch.run_at(now()).await, BackgroundFetchResult::NoData);
    assert_eq!(h.settings.current().last_fetch_at, None);
}

#[tokio::test]
async fn recent_notification_reports_no_data() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.has_attempted_notification_permission = true;
        s.notifications_enabled = true;
        s.last_push_at = Some(now() - chrono::Duration::days(6));
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::NoData);
    assert!(h.notes.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn due_notification_posts_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/count"))
        .and(query_param("starttime", "2024-05-01T12:00:00"))
        .and(query_param("minmagnitude", "3.8"))
        .and(query_param("maxradiuskm", "150"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 5,
            "maxAllowed": 20000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.has_attempted_notification_permission = true;
        s.notifications_enabled = true;
        s.cached_place = Some(Coordinate::new(35.7, -117.6));
        s.last_push_at = Some(now() - chrono::Duration::days(14));
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::NewData);
    assert_eq!(
        h.notes.0.lock().unwrap().as_slice(),
        ["5 quakes happened last week"]
    );
    assert_eq!(h.settings.current().last_push_at, Some(now()));

    let reopened = SettingsStore::open(h.settings.path()).unwrap();
    assert_eq!(reopened.current().last_push_at, Some(now()));
}

#[tokio::test]
async fn single_new_quake_does_not_notify() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "count": 1 })))
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.has_attempted_notification_permission = true;
        s.notifications_enabled = true;
    })
    .await;

    assert_eq!(h.fetch.run_at(now()).await, BackgroundFetchResult::Failed);
    assert!(h.notes.0.lock().unwrap().is_empty());
    assert_eq!(h.settings.current().last_push_at, None);
}

#[tokio::test]
async fn slow_provider_exhausts_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "features": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let h = harness(&server, true, |s| {
        s.providers = vec![Provider::Usgs];
        s.last_option = Some(LastOption::World);
    })
    .await;
    let fetch = h.fetch.with_budget(Duration::from_millis(200));

    let mut reported = Vec::new();
    fetch.run(|result| reported.push(result)).await;
    assert_eq!(reported, [BackgroundFetchResult::Failed]);
}
