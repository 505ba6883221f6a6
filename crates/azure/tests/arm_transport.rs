//! HTTP-level behaviour of the Azure transport against a mock server.

use keyguard_azure::{ArmClient, AzureKeyProvider, AzureMetricsSource, resource_id};
use keyguard_core::config::AzureConfig;
use keyguard_core::{ResourceDescriptor, SecretString, SlotName, UpstreamError};
use keyguard_credential::{CredentialProvider, MetricsSource};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant-1/oauth2/token";

fn resource() -> ResourceDescriptor {
    ResourceDescriptor::new("sub-1", "rg-ai", "openai-east")
}

fn client(server: &MockServer) -> Arc<ArmClient> {
    let config = AzureConfig {
        tenant_id: "tenant-1".into(),
        client_id: "client-1".into(),
        client_secret: SecretString::new("s3cret"),
        default_subscription: None,
        login_endpoint: server.uri(),
        management_endpoint: server.uri(),
        request_timeout: Duration::from_secs(5),
    };
    Arc::new(ArmClient::new(&config).unwrap())
}

fn token(value: &str, expires_in: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "access_token": value,
        "expires_in": expires_in.to_string(),
    }))
}

fn metrics_body(count: u64) -> serde_json::Value {
    json!({
        "value": [{
            "name": { "value": "TotalRequests" },
            "timeseries": [{ "data": [{ "count": 1 }, { "count": count }] }]
        }]
    })
}

fn metrics_path() -> String {
    format!("{}/providers/microsoft.insights/metrics", resource_id(&resource()))
}

#[tokio::test]
async fn metrics_query_uses_cached_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .respond_with(token("tok-1", 3600))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metrics_path()))
        .and(query_param("api-version", "2021-05-01"))
        .and(query_param("metricnames", "TotalRequests"))
        .and(query_param("filter", "ResultCode eq '429'"))
        .and(query_param("timespan", "PT1M"))
        .and(query_param("aggregation", "Count"))
        .and(query_param("interval", "PT1M"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metrics_body(14)))
        .expect(2)
        .mount(&server)
        .await;

    let metrics = AzureMetricsSource::new(client(&server));

    assert_eq!(metrics.error_count(&resource()).await.unwrap(), 14);
    assert_eq!(metrics.error_count(&resource()).await.unwrap(), 14);
}

#[tokio::test]
async fn short_lived_token_is_fetched_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 300))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    client.test_connection().await.unwrap();
    client.test_connection().await.unwrap();
}

#[tokio::test]
async fn unauthorized_response_refreshes_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 3600))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-2", 3600))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metrics_path()))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metrics_path()))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metrics_body(7)))
        .expect(1)
        .mount(&server)
        .await;

    let metrics = AzureMetricsSource::new(client(&server));

    assert_eq!(metrics.error_count(&resource()).await.unwrap(), 7);
}

#[tokio::test]
async fn repeated_unauthorized_gives_up_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 3600))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metrics_path()))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let metrics = AzureMetricsSource::new(client(&server));
    let error = metrics.error_count(&resource()).await.unwrap_err();

    assert!(matches!(error, UpstreamError::Unauthorized { .. }), "{error:?}");
    assert_eq!(error.operation(), "query_metrics");
}

#[tokio::test]
async fn empty_metrics_count_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 3600))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(metrics_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let metrics = AzureMetricsSource::new(client(&server));

    assert_eq!(metrics.error_count(&resource()).await.unwrap(), 0);
}

#[tokio::test]
async fn lists_and_regenerates_keys() {
    let server = MockServer::start().await;
    let id = resource_id(&resource());
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 3600))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{id}/listKeys")))
        .and(query_param("api-version", "2023-05-01"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "key1": "first", "key2": "second" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{id}/regenerateKey")))
        .and(query_param("api-version", "2023-05-01"))
        .and(body_json(json!({ "keyName": "key2" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "key1": "first", "key2": "rotated" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = AzureKeyProvider::new(client(&server));

    let listing = provider.list(&resource()).await.unwrap();
    let slots: Vec<_> = listing.keys().map(SlotName::as_str).collect();
    assert_eq!(slots, ["key1", "key2"]);

    let secret = provider
        .regenerate(&resource(), &SlotName::new("key2"))
        .await
        .unwrap();
    assert_eq!(secret, SecretString::new("rotated"));
}

#[tokio::test]
async fn provider_errors_carry_status_and_redact_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token("tok-1", 3600))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/listKeys", resource_id(&resource()))))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "key1": "leaked", "error": "boom" })),
        )
        .mount(&server)
        .await;

    let provider = AzureKeyProvider::new(client(&server));
    let error = provider.list(&resource()).await.unwrap_err();

    match error {
        UpstreamError::Status {
            operation,
            status,
            body,
        } => {
            assert_eq!(operation, "list_keys");
            assert_eq!(status, 500);
            assert!(!body.contains("leaked"));
            assert!(body.contains("boom"));
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credentials_fail_connection_test() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
        })))
        .mount(&server)
        .await;

    let error = client(&server).test_connection().await.unwrap_err();

    assert!(matches!(error, UpstreamError::Unauthorized { .. }), "{error:?}");
}
