//! Extractor tests against a local mock HTTP server

use apod_etl::config::ApiConfig;
use apod_etl::extract::{ApodApi, ApodClient, ExtractError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/planetary/apod", server.uri()),
        api_key: "DEMO_KEY".to_string(),
        timeout_secs: 5,
    }
}

#[tokio::test]
async fn fetch_daily_returns_raw_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/planetary/apod"))
        .and(query_param("api_key", "DEMO_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "date": "2024-05-01",
            "title": "T",
            "url": "https://x/img.jpg",
            "explanation": "E",
            "media_type": "image"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ApodClient::new(&config_for(&server)).unwrap();
    let record = client.fetch_daily().await.unwrap();

    assert_eq!(record.get_str("date"), Some("2024-05-01"));
    assert_eq!(record.get_str("title"), Some("T"));
    assert_eq!(record.get_str("hdurl"), None);
}

#[tokio::test]
async fn server_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = ApodClient::new(&config_for(&server)).unwrap();
    let err = client.fetch_daily().await.unwrap_err();
    assert!(matches!(err, ExtractError::Http(_)));
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2, 3])))
        .mount(&server)
        .await;

    let client = ApodClient::new(&config_for(&server)).unwrap();
    let err = client.fetch_daily().await.unwrap_err();
    assert!(matches!(err, ExtractError::NotAnObject));
}
