//! Integration tests for the token refresh client against a mock endpoint.

use chrono::Utc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quotapane::QuotapaneError;
use quotapane::credentials::refresh::{OAUTH_CLIENT_ID, TokenRefreshClient};

#[tokio::test]
async fn refresh_success_builds_fresh_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .and(body_partial_json(serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": "sk-ant-ort01-old",
            "client_id": OAUTH_CLIENT_ID,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sk-ant-oat01-new",
            "refresh_token": "sk-ant-ort01-new",
            "expires_in": 28800,
            "scope": "user:profile user:inference",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TokenRefreshClient::with_endpoint(format!("{}/v1/oauth/token", server.uri()))
        .expect("client");
    let record = client.refresh("sk-ant-ort01-old").await.expect("refreshed");

    assert_eq!(record.access_token, "sk-ant-oat01-new");
    assert_eq!(record.refresh_token.as_deref(), Some("sk-ant-ort01-new"));
    assert_eq!(
        record.scopes,
        vec!["user:profile".to_string(), "user:inference".to_string()]
    );

    let expires = record.expires_at.expect("expiry");
    let delta = expires.signed_duration_since(Utc::now()).num_seconds();
    assert!((28700..=28900).contains(&delta), "delta: {delta}");
}

#[tokio::test]
async fn refresh_rejection_extracts_error_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Refresh token has been revoked",
        })))
        .mount(&server)
        .await;

    let client = TokenRefreshClient::with_endpoint(server.uri()).expect("client");
    let err = client.refresh("sk-ant-ort01-old").await.expect_err("rejected");

    match err {
        QuotapaneError::RefreshRejected { message } => {
            assert_eq!(message, "Refresh token has been revoked");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn refresh_rejection_survives_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let client = TokenRefreshClient::with_endpoint(server.uri()).expect("client");
    let err = client.refresh("sk-ant-ort01-old").await.expect_err("rejected");

    match err {
        QuotapaneError::RefreshRejected { message } => {
            assert!(message.contains("502"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_endpoint_is_a_network_error_not_a_rejection() {
    // Nothing listens on the discard port.
    let client = TokenRefreshClient::with_endpoint("http://127.0.0.1:9/v1/oauth/token")
        .expect("client");
    let err = client.refresh("sk-ant-ort01-old").await.expect_err("network");

    assert!(
        matches!(err, QuotapaneError::RefreshNetwork { .. }),
        "unexpected error: {err:?}"
    );
    assert!(err.is_retryable());
}
