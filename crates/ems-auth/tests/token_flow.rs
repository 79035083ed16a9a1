//! Token cache and directory client behavior against a mock provider.

use std::sync::Arc;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ems_auth::{AuthError, DirectoryClient, EntraClient, EntraConfig, TokenCache};
use ems_auth::error::DirectoryError;

fn entra_config(server: &MockServer) -> EntraConfig {
    EntraConfig {
        tenant_id: "test-tenant".into(),
        client_id: "test-client".into(),
        client_secret: "test-secret".into(),
        redirect_uri: "http://localhost:8080/api/v1/auth/redirect".into(),
        authority: server.uri(),
        graph_base_url: server.uri(),
        scopes: vec!["openid".into(), "User.Read".into()],
    }
}

fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    })
}

async fn cache_against(server: &MockServer) -> Arc<TokenCache> {
    let entra = EntraClient::new(entra_config(server)).unwrap();
    Arc::new(TokenCache::new(entra))
}

#[tokio::test]
async fn concurrent_callers_trigger_single_acquisition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("app-token", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let (a, b, c, d) = tokio::join!(
        cache.get_valid_token(),
        cache.get_valid_token(),
        cache.get_valid_token(),
        cache.get_valid_token(),
    );
    for token in [a, b, c, d] {
        assert_eq!(token.unwrap(), "app-token");
    }
}

#[tokio::test]
async fn token_inside_expiry_buffer_is_reacquired() {
    let server = MockServer::start().await;
    // First token expires in 60s, inside the 5-minute buffer, so the
    // next call must go back to the provider.
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short-lived", 60)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("long-lived", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    assert_eq!(cache.get_valid_token().await.unwrap(), "short-lived");
    assert_eq!(cache.get_valid_token().await.unwrap(), "long-lived");
    // Valid token is now cached; no further provider calls.
    assert_eq!(cache.get_valid_token().await.unwrap(), "long-lived");
}

#[tokio::test]
async fn invalidate_forces_fresh_acquisition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("token", 3600)))
        .expect(2)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    cache.get_valid_token().await.unwrap();
    cache.invalidate("test").await;
    cache.get_valid_token().await.unwrap();
}

#[tokio::test]
async fn transient_provider_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("eventually", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    assert_eq!(cache.get_valid_token().await.unwrap(), "eventually");
}

#[tokio::test]
async fn provider_rejection_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_client"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let err = cache.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn directory_401_invalidates_and_retries_once() {
    let server = MockServer::start().await;
    // The provider hands out a revoked token first, then a good one.
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("revoked", 3600)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 3600)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/ana%40example.com"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/ana%40example.com"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "sub-1",
            "displayName": "Ana Ruiz",
            "mail": "ana@example.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let directory = DirectoryClient::new(server.uri(), cache).unwrap();
    let profile = directory.get_user_by_email("ana@example.com").await.unwrap();
    assert_eq!(profile.id, "sub-1");
    assert_eq!(profile.email(), Some("ana@example.com"));
}

#[tokio::test]
async fn second_directory_401_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("token", 3600)))
        .mount(&server)
        .await;
    // Both the original request and the single retry get 401.
    Mock::given(method("GET"))
        .and(path("/users/ana%40example.com"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let directory = DirectoryClient::new(server.uri(), cache).unwrap();
    let err = directory.get_user_by_email("ana@example.com").await.unwrap_err();
    assert!(matches!(err, DirectoryError::AuthFailed { .. }));
}

#[tokio::test]
async fn directory_backs_off_on_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("token", 3600)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "sub-2",
            "userPrincipalName": "bo@example.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let directory = DirectoryClient::new(server.uri(), cache).unwrap();
    let profile = directory.get_profile("token").await.unwrap();
    assert_eq!(profile.id, "sub-2");
}

#[tokio::test]
async fn caller_supplied_bearer_is_not_refreshed_on_401() {
    let server = MockServer::start().await;
    // No token-endpoint mock: the cache must never be consulted.
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let cache = cache_against(&server).await;
    let directory = DirectoryClient::new(server.uri(), cache).unwrap();
    let err = directory.get_profile("user-token").await.unwrap_err();
    assert!(matches!(err, DirectoryError::AuthFailed { .. }));
}

#[tokio::test]
async fn code_exchange_parses_provider_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/test-tenant/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "delegated",
            "refresh_token": "refresh",
            "id_token": "idtok",
            "expires_in": 3599,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entra = EntraClient::new(entra_config(&server)).unwrap();
    let tokens = entra.exchange_code("the-code").await.unwrap();
    assert_eq!(tokens.access_token, "delegated");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh"));
    assert_eq!(tokens.expires_in, 3599);
}
