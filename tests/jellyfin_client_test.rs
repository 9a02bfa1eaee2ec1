//! JellyfinClient against a mock library server.

use std::time::Duration;

use assert_matches::assert_matches;
use reelwatch::config::LibraryConfig;
use reelwatch::library::{JellyfinClient, LibraryClient};
use reelwatch_common::{Error, ExternalKey, ItemKind, KeyScheme};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, timeout_secs: u64) -> JellyfinClient {
    JellyfinClient::new(&LibraryConfig {
        url: format!("{}/", server.uri()),
        api_key: "secret".into(),
        request_timeout_secs: timeout_secs,
    })
}

#[tokio::test]
async fn find_by_key_filters_on_provider_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(header("X-Emby-Token", "secret"))
        .and(query_param("AnyProviderIdEquals", "tmdb.27205"))
        .and(query_param("IncludeItemTypes", "Movie"))
        .and(query_param("Recursive", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                {"Id": "m1", "Name": "Inception", "Type": "Movie", "ProviderIds": {"Tmdb": "27205"}},
                {"Id": "m2", "Name": "Interstellar", "Type": "Movie", "ProviderIds": {"Tmdb": "157336"}}
            ],
            "TotalRecordCount": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let found = client
        .find_by_key(ItemKind::Movie, &ExternalKey::new(KeyScheme::Primary, "27205"))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "m1");
}

#[tokio::test]
async fn item_returns_details_or_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(query_param("Ids", "m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{
                "Id": "m1",
                "Name": "Inception",
                "Type": "Movie",
                "MediaStreams": [{"Type": "Video", "Codec": "hevc", "Width": 3840, "Height": 2160}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(query_param("Ids", "gone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Items": []})))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let item = client.item("m1").await.unwrap().unwrap();
    assert_eq!(item.media_streams.len(), 1);
    assert_eq!(item.media_streams[0].width, Some(3840));

    assert!(client.item("gone").await.unwrap().is_none());
}

#[tokio::test]
async fn children_query_by_parent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .and(query_param("ParentId", "se1"))
        .and(query_param("IncludeItemTypes", "Episode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                {"Id": "e1", "Type": "Episode", "IndexNumber": 1, "LocationType": "FileSystem"},
                {"Id": "e2", "Type": "Episode", "IndexNumber": 2, "LocationType": "Virtual"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let episodes = client.children("se1", ItemKind::Episode).await.unwrap();
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes.iter().filter(|e| e.has_file()).count(), 1);
}

#[tokio::test]
async fn primary_image_handles_missing_art() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items/m1/Images/Primary"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Items/m2/Images/Primary"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    assert_eq!(
        client.primary_image("m1").await.unwrap(),
        Some(vec![0xFF, 0xD8, 0xFF])
    );
    assert_eq!(client.primary_image("m2").await.unwrap(), None);
}

#[tokio::test]
async fn server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let err = client.item("m1").await.unwrap_err();
    assert_matches!(err, Error::Http(_));
    assert!(err.is_transient());
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"Items": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let err = client.item("m1").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn connection_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/System/Info"))
        .and(header("X-Emby-Token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Version": "10.9.0"})))
        .mount(&server)
        .await;

    assert!(client_for(&server, 5).test_connection().await.unwrap());

    let unauthorized = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/System/Info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&unauthorized)
        .await;
    assert!(!client_for(&unauthorized, 5).test_connection().await.unwrap());
}
