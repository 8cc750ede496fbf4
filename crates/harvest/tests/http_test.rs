//! Fetcher tests over real HTTP against a local mock server.

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use harvest::fetch::{Endpoint, FetchConfig, FetchOutcome, Fetcher, Keys, RetryPolicy};

fn fetcher() -> Fetcher {
    let config = FetchConfig::default().with_retry(RetryPolicy::immediate(3));
    Fetcher::http(&config).unwrap()
}

fn keys(pairs: &[(&str, &str)]) -> Keys {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_headers_and_query_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/menu/make"))
        .and(query_param("year", "2024"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"menuItem": {"value": "Acme"}})))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::new(server.uri(), "/menu/make")
        .with_header("Accept", "application/json")
        .with_query("year", "{year}");
    let outcome = fetcher().fetch_endpoint(&endpoint, &keys(&[("year", "2024")])).await;

    assert_eq!(outcome, FetchOutcome::Json(json!({"menuItem": {"value": "Acme"}})));
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/SafetyRatings"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/SafetyRatings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = Endpoint::new(server.uri(), "/SafetyRatings");
    let outcome = fetcher().fetch_endpoint(&endpoint, &Keys::new()).await;

    assert_eq!(outcome, FetchOutcome::Json(json!({"Results": []})));
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/limited"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher();
    let outcome = |p: &'static str| {
        let endpoint = Endpoint::new(server.uri(), p);
        let fetcher = fetcher.clone();
        async move { fetcher.fetch_endpoint(&endpoint, &Keys::new()).await }
    };

    assert_eq!(outcome("/empty").await, FetchOutcome::Empty);
    assert_eq!(outcome("/broken").await, FetchOutcome::Failed);
    assert_eq!(outcome("/limited").await, FetchOutcome::Failed);
    assert_eq!(outcome("/html").await, FetchOutcome::Failed);
}

#[tokio::test]
async fn test_connection_refused_is_failed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let endpoint = Endpoint::new(uri, "/menu/year");
    let outcome = fetcher().fetch_endpoint(&endpoint, &Keys::new()).await;

    assert_eq!(outcome, FetchOutcome::Failed);
}
