//! Webhook endpoints, driven through the router without a listener.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{hd_streams, movie, Harness};
use http_body_util::BodyExt;
use reelwatch::config::{Config, TrackerConfig};
use reelwatch::server::{create_router, AppContext};
use reelwatch_common::TrackerKind;
use serde_json::{json, Value};
use tower::ServiceExt;

fn tracker(name: &str, kind: TrackerKind, enabled: bool) -> TrackerConfig {
    TrackerConfig {
        name: name.into(),
        tracker_type: kind,
        url: format!("http://{name}:7878"),
        api_key: "key".into(),
        enabled,
    }
}

fn harness() -> Harness {
    let mut config = Config::default();
    config.trackers = vec![
        tracker("radarr", TrackerKind::Movies, true),
        tracker("sonarr", TrackerKind::Series, true),
        tracker("sonarr-anime", TrackerKind::Series, false),
    ];
    Harness::with_config(config)
}

fn router(h: &Harness) -> Router {
    create_router(AppContext {
        config: Arc::new(h.config.clone()),
        signals: h.engine.signals.clone(),
    })
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Option<Value>) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn health_check() {
    let h = harness();
    let response = router(&h)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn radarr_grab_is_queued() {
    let h = harness();
    let (status, body) = post_json(
        router(&h),
        "/webhook/radarr",
        json!({
            "eventType": "Grab",
            "movie": {"id": 1, "title": "Inception", "year": 2010, "tmdbId": 27205, "imdbId": "tt1375666"},
            "isUpgrade": true
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "queued");
    assert_eq!(body["queued"], 1);

    let entry = h.engine.stores.movies.get("tmdb:27205").unwrap();
    assert_eq!(entry.item_title, "Inception");
    assert!(entry.baseline_snapshot.is_none());
}

#[tokio::test]
async fn sonarr_grab_splits_by_season() {
    let h = harness();
    let (status, body) = post_json(
        router(&h),
        "/webhook/sonarr",
        json!({
            "eventType": "Download",
            "series": {"id": 7, "title": "Breaking Bad", "year": 2008, "tvdbId": 81189},
            "episodes": [
                {"id": 1, "episodeNumber": 1, "seasonNumber": 1},
                {"id": 2, "episodeNumber": 2, "seasonNumber": 1},
                {"id": 3, "episodeNumber": 1, "seasonNumber": 2}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["queued"], 2);
    assert_eq!(h.engine.stores.series.len(), 2);
    let first = h.engine.stores.series.get("tvdb:81189:S01").unwrap();
    assert_eq!(first.scope.episode_count(), Some(2));
    assert!(h.engine.stores.series.get("tvdb:81189:S02").is_some());
}

#[tokio::test]
async fn untracked_events_are_ignored() {
    let h = harness();
    let (status, body) = post_json(
        router(&h),
        "/webhook/radarr",
        json!({"eventType": "Test", "movie": {"id": 1, "title": "Test", "tmdbId": 1}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ignored");
    assert!(h.engine.stores.movies.is_empty());
}

#[tokio::test]
async fn grab_without_ids_is_not_queued() {
    let h = harness();
    let (_, body) = post_json(
        router(&h),
        "/webhook/radarr",
        json!({"eventType": "Grab", "movie": {"id": 1, "title": "Mystery"}}),
    )
    .await;
    let body = body.unwrap();
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["queued"], 0);
}

#[tokio::test]
async fn unknown_and_disabled_trackers() {
    let h = harness();
    let (status, _) = post_json(router(&h), "/webhook/lidarr", json!({"eventType": "Grab"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        post_json(router(&h), "/webhook/sonarr-anime", json!({"eventType": "Grab"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn malformed_tracker_payload_is_rejected() {
    let h = harness();
    let (status, _) = post_json(router(&h), "/webhook/radarr", json!({"movie": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn library_item_added() {
    let h = harness();
    h.library.insert(movie("m1", "Heat", 1995, "949", hd_streams()));

    let payload = json!({
        "ItemType": "Movie",
        "ItemId": "m1",
        "Name": "Heat",
        "Year": 1995,
        "Provider_tmdb": "949",
        "Overview": "A group of high-end professional thieves."
    });

    let (status, body) = post_json(router(&h), "/webhook/library", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "notified");
    assert_eq!(h.dispatcher.sent()[0].representative_item_id, "m1");

    let (_, body) = post_json(router(&h), "/webhook/library", payload).await;
    assert_eq!(body.unwrap()["status"], "already_notified");
}

#[tokio::test]
async fn library_webhook_requires_item_id() {
    let h = harness();
    let (status, _) =
        post_json(router(&h), "/webhook/library", json!({"ItemType": "Movie", "Name": "Heat"}))
            .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
